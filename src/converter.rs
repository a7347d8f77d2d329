//! 单个工程的转换流程（解析 -> 校验 -> 生成 -> 回写）以及批量转换。

use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{ConvertError, ValidationError};
use crate::generator::generate_cmake_lists;
use crate::mappings::Mappings;
use crate::models::Project;
use crate::parser::parse_project_file;
use crate::utils::{normalize_path, relative_path};
use crate::validator::validate;
use crate::writeback::{WriteOutcome, write_if_changed};

pub const OUTPUT_FILE_NAME: &str = "CMakeLists.txt";

/// 一个转换任务：输入工程文件和输出脚本路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub project_file: PathBuf,
    pub output: PathBuf,
}

impl ConversionJob {
    /// 输出默认放在工程文件旁边
    pub fn new(project_file: impl Into<PathBuf>) -> Self {
        let project_file = project_file.into();
        let output = project_dir(&project_file).join(OUTPUT_FILE_NAME);
        Self {
            project_file,
            output,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Converted(WriteOutcome),
    /// 宽松模式下校验失败，工程被跳过
    Skipped(ValidationError),
}

fn project_dir(project_file: &Path) -> &Path {
    project_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// 来源注释里的工程路径：相对于根目录，算不出时只用文件名
fn origin_name(project_file: &Path, settings: &Settings) -> String {
    match relative_path(project_file, &settings.root_dir()) {
        Some(rel) if !rel.as_os_str().is_empty() => normalize_path(&rel.to_string_lossy()),
        _ => project_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// 校验失败时输出工程的完整状态，便于排查
fn dump_project(project: &Project) {
    match serde_json::to_string_pretty(project) {
        Ok(dump) => error!("Project state:\n{}", dump),
        Err(e) => error!("Project state could not be serialized: {}", e),
    }
}

/// 转换一个工程文件
pub fn convert_project(job: &ConversionJob, settings: &Settings) -> Result<ConversionStatus, ConvertError> {
    info!("Converting {}", job.project_file.display());

    let outcome = parse_project_file(&job.project_file)?;
    if !outcome.log.unknown.is_empty() {
        info!(
            "{}: {} unrecognized construct(s) ignored",
            job.project_file.display(),
            outcome.log.unknown.len()
        );
    }
    let mut projects = outcome.projects.into_iter();
    let Some(project) = projects.next() else {
        return Err(ConvertError::NoProject(job.project_file.clone()));
    };
    let extra = projects.count();
    if extra > 0 {
        warn!(
            "{} declares {} additional project(s), only '{}' is converted",
            job.project_file.display(),
            extra,
            project.name
        );
    }

    if let Err(e) = validate(&project, settings) {
        error!("{}: {}", job.project_file.display(), e);
        dump_project(&project);
        if settings.strict_validation {
            return Err(e.into());
        }
        warn!("Skipping {}", job.project_file.display());
        return Ok(ConversionStatus::Skipped(e));
    }

    let dir = project_dir(&job.project_file);
    let mappings = Mappings::load(&settings.local_mapping_dir(dir), &settings.root_mapping_dir());
    let origin = origin_name(&job.project_file, settings);

    let text = generate_cmake_lists(&project, &mappings, settings, &origin);
    let written = write_if_changed(&job.output, &text, settings.file_permissions)?;
    if written == WriteOutcome::Unchanged {
        info!("{} unchanged", job.output.display());
    }
    Ok(ConversionStatus::Converted(written))
}

/// 批量转换的统计
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: Vec<(PathBuf, ConvertError)>,
    /// 严格模式下校验失败，剩余工程未转换
    pub aborted: bool,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 逐个转换。I/O 等失败只影响单个工程；严格模式下校验失败会中止整个运行
pub fn convert_all(jobs: &[ConversionJob], settings: &Settings) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (index, job) in jobs.iter().enumerate() {
        match convert_project(job, settings) {
            Ok(ConversionStatus::Converted(WriteOutcome::Unchanged)) => summary.unchanged += 1,
            Ok(ConversionStatus::Converted(WriteOutcome::Written { .. })) => summary.written += 1,
            Ok(ConversionStatus::Skipped(_)) => summary.skipped += 1,
            Err(e) => {
                error!("{}: {}", job.project_file.display(), e);
                let abort = settings.strict_validation && matches!(e, ConvertError::Validation(_));
                summary.failed.push((job.project_file.clone(), e));
                if abort {
                    error!(
                        "Strict validation failed, {} remaining project(s) not converted",
                        jobs.len() - index - 1
                    );
                    summary.aborted = true;
                    break;
                }
            }
        }
    }
    info!(
        "{} written, {} unchanged, {} skipped, {} failed",
        summary.written,
        summary.unchanged,
        summary.skipped,
        summary.failed.len()
    );
    summary
}
