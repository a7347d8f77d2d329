use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::Settings;
use crate::converter::ConversionJob;
use crate::error::ConvertError;

/// 命令行参数结构
#[derive(Parser, Debug)]
#[command(
    name = "vcproj2cmake",
    version,
    about = "Convert Visual Studio project files (.vcproj / .vcxproj) into CMakeLists.txt."
)]
pub struct CliArgs {
    #[arg(value_name = "PROJECT", required = true)]
    pub projects: Vec<PathBuf>,

    #[arg(short, long, value_name = "FILE", help = "Output file (single project only; default: CMakeLists.txt next to the project).")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Source tree root holding the shared mapping files.")]
    pub root: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "JSON settings file.")]
    pub settings: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Configuration whose settings are used where CMake cannot vary per configuration.")]
    pub authoritative_config: Option<String>,

    #[arg(long, help = "Abort on validation failures instead of skipping the project.")]
    pub strict: bool,

    #[arg(long, help = "Reject projects that list no files.")]
    pub require_files: bool,

    #[arg(long, help = "Write a generation timestamp into the output.")]
    pub timestamp: bool,

    #[arg(short, long, action = ArgAction::Count, help = "More log output (repeat for more).")]
    pub verbose: u8,

    #[arg(short, long, help = "Only log errors.")]
    pub quiet: bool,
}

impl CliArgs {
    /// 设置文件（如有）加上命令行覆盖项
    pub fn settings(&self) -> Result<Settings, ConvertError> {
        let mut settings = match &self.settings {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };
        if let Some(root) = &self.root {
            settings.root_dir = Some(root.clone());
        }
        if let Some(name) = &self.authoritative_config {
            settings.authoritative_config = name.clone();
        }
        settings.strict_validation |= self.strict;
        settings.require_files |= self.require_files;
        settings.emit_timestamp |= self.timestamp;
        Ok(settings)
    }

    pub fn jobs(&self) -> Vec<ConversionJob> {
        self.projects
            .iter()
            .map(|project| {
                let job = ConversionJob::new(project);
                match &self.output {
                    Some(output) => job.with_output(output),
                    None => job,
                }
            })
            .collect()
    }

    /// stderrlog 的 verbosity：默认只显示警告和错误
    pub fn log_verbosity(&self) -> usize {
        1 + self.verbose as usize
    }
}

/// 从给定参数列表解析
pub fn parse_args_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = CliArgs::try_parse_from(args)?;
    if args.output.is_some() && args.projects.len() > 1 {
        return Err(CliArgs::command().error(
            ErrorKind::ArgumentConflict,
            "--output can only be used with a single project",
        ));
    }
    Ok(args)
}

/// 解析命令行参数
pub fn parse_args() -> Result<CliArgs, clap::Error> {
    parse_args_from(std::env::args_os())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = parse_args_from(["vcproj2cmake", "a.vcproj"]).unwrap();
        assert_eq!(args.projects, vec![PathBuf::from("a.vcproj")]);
        assert_eq!(args.log_verbosity(), 1);
        let settings = args.settings().unwrap();
        assert!(!settings.strict_validation);
        assert_eq!(settings.authoritative_config, "Debug");
    }

    #[test]
    fn test_overrides() {
        let args = parse_args_from([
            "vcproj2cmake",
            "--strict",
            "--timestamp",
            "--authoritative-config",
            "Release",
            "--root",
            "/src",
            "-vv",
            "a.vcxproj",
        ])
        .unwrap();
        let settings = args.settings().unwrap();
        assert!(settings.strict_validation);
        assert!(settings.emit_timestamp);
        assert_eq!(settings.authoritative_config, "Release");
        assert_eq!(settings.root_dir, Some(PathBuf::from("/src")));
        assert_eq!(args.log_verbosity(), 3);
    }

    #[test]
    fn test_output_needs_single_project() {
        assert!(parse_args_from(["vcproj2cmake", "-o", "out.txt", "a.vcproj", "b.vcproj"]).is_err());

        let args = parse_args_from(["vcproj2cmake", "-o", "out.txt", "a.vcproj"]).unwrap();
        assert_eq!(args.jobs()[0].output, PathBuf::from("out.txt"));
    }

    #[test]
    fn test_project_required() {
        assert!(parse_args_from(["vcproj2cmake"]).is_err());
    }
}
