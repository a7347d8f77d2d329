//! 工程文件解析：按扩展名选择方言，两种方言输出同一种工程模型。

mod vcproj;
mod vcxproj;

use log::{debug, info, warn};
use roxmltree::Document;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;
use crate::models::{
    CharacterSet, Dialect, ExceptionHandling, LibraryUsage, Optimization, PchMode, Project,
    RuntimeLibrary, TargetKind, WarningLevel,
};

/// 扩展名 -> 方言 的静态注册表
const DIALECTS: &[(&str, Dialect)] = &[("vcproj", Dialect::Vcproj), ("vcxproj", Dialect::Vcxproj)];

/// 新格式的过滤器伴随文件后缀
pub const FILTERS_SUFFIX: &str = ".filters";

/// 生成器产物、图标、位图、纯文本等，直接静默跳过
const JUNK_EXTENSIONS: &[&str] = &["l", "lex", "y", "yy", "ico", "bmp", "cur", "txt"];

/// 生成文件过滤器的名称（不同语言版本的 IDE 写法不同）
const GENERATED_FILTER_NAMES: &[&str] = &["Generated Files", "Generierte Dateien"];

pub fn dialect_for_path(path: &Path) -> Option<Dialect> {
    let ext = path.extension()?.to_str()?;
    DIALECTS
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, d)| *d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKind {
    Attribute,
    Element,
}

/// 解析器不认识的 XML 结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConstruct {
    pub parser: &'static str,
    pub kind: UnknownKind,
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    JunkExtension,
    IdlGenerated,
    LibrarySource,
    NotSourceControlled,
    GeneratedFilesFilter,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::JunkExtension => "generated or non-source file type",
            SkipReason::IdlGenerated => "generated by the IDL compiler at build time",
            SkipReason::LibrarySource => "library listed as a source file, belongs to the link step",
            SkipReason::NotSourceControlled => "filter is not under source control",
            SkipReason::GeneratedFilesFilter => "filter holds generated files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// 解析过程中的诊断记录，只记录和打日志，不中断解析
#[derive(Debug, Default)]
pub struct ParseLog {
    pub unknown: Vec<UnknownConstruct>,
    pub skipped: Vec<SkippedFile>,
}

impl ParseLog {
    pub fn unknown_attribute(&mut self, parser: &'static str, owner: &str, name: &str) {
        warn!("{}: unknown attribute '{}' on <{}>", parser, name, owner);
        self.unknown.push(UnknownConstruct {
            parser,
            kind: UnknownKind::Attribute,
            owner: owner.to_string(),
            name: name.to_string(),
        });
    }

    pub fn unknown_element(&mut self, parser: &'static str, owner: &str, name: &str) {
        warn!("{}: unknown element <{}> in <{}>", parser, name, owner);
        self.unknown.push(UnknownConstruct {
            parser,
            kind: UnknownKind::Element,
            owner: owner.to_string(),
            name: name.to_string(),
        });
    }

    pub fn skip(&mut self, path: &str, reason: SkipReason) {
        if reason == SkipReason::JunkExtension {
            debug!("Skipping {}: {}", path, reason.describe());
        } else {
            info!("Skipping {}: {}", path, reason.describe());
        }
        self.skipped.push(SkippedFile {
            path: path.to_string(),
            reason,
        });
    }
}

/// 一次解析的结果
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub projects: Vec<Project>,
    pub log: ParseLog,
}

/// 判断文件是否因自身类型被跳过
pub fn classify_file(path: &str) -> Option<SkipReason> {
    let lower = path.to_ascii_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    let ext = Path::new(file_name).extension().and_then(|e| e.to_str()).unwrap_or("");

    if JUNK_EXTENSIONS.contains(&ext) {
        Some(SkipReason::JunkExtension)
    } else if file_name.ends_with("_i.c") || file_name.ends_with("_p.c") || file_name == "dlldata.c" {
        Some(SkipReason::IdlGenerated)
    } else if ext == "lib" {
        Some(SkipReason::LibrarySource)
    } else {
        None
    }
}

pub fn is_generated_files_filter(name: &str) -> bool {
    GENERATED_FILTER_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(name.trim()))
}

/// 枚举的有序符号表：下标即旧格式的整数编码，符号即新格式的字符串编码
pub trait EnumTable: Copy + 'static {
    const WHAT: &'static str;
    const TABLE: &'static [(&'static str, Self)];
    const FALLBACK: Self;
}

/// 解析整数或符号编码的枚举值，无法识别时返回默认值并警告
pub fn decode_enum<T: EnumTable>(raw: &str) -> T {
    let raw = raw.trim();
    if raw.is_empty() {
        return T::FALLBACK;
    }
    let index = match raw.parse::<usize>() {
        Ok(i) => Some(i),
        Err(_) => T::TABLE
            .iter()
            .position(|(symbol, _)| symbol.eq_ignore_ascii_case(raw)),
    };
    match index.and_then(|i| T::TABLE.get(i)) {
        Some((_, value)) => *value,
        None => {
            warn!("Unrecognized {} value '{}', using default", T::WHAT, raw);
            T::FALLBACK
        }
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

impl EnumTable for TargetKind {
    const WHAT: &'static str = "configuration type";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("Unknown", TargetKind::Unknown),
        ("Application", TargetKind::Application),
        ("DynamicLibrary", TargetKind::DynamicLibrary),
        ("Makefile", TargetKind::Unknown),
        ("StaticLibrary", TargetKind::StaticLibrary),
    ];
    const FALLBACK: Self = TargetKind::Unknown;
}

impl EnumTable for LibraryUsage {
    const WHAT: &'static str = "library usage";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("false", LibraryUsage::None),
        ("Static", LibraryUsage::Static),
        ("Dynamic", LibraryUsage::Dynamic),
    ];
    const FALLBACK: Self = LibraryUsage::None;
}

impl EnumTable for CharacterSet {
    const WHAT: &'static str = "character set";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("NotSet", CharacterSet::Sbcs),
        ("Unicode", CharacterSet::Unicode),
        ("MultiByte", CharacterSet::Mbcs),
    ];
    const FALLBACK: Self = CharacterSet::Sbcs;
}

impl EnumTable for ExceptionHandling {
    const WHAT: &'static str = "exception handling";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("false", ExceptionHandling::Disabled),
        ("Sync", ExceptionHandling::Sync),
        ("Async", ExceptionHandling::Async),
        ("SyncCThrow", ExceptionHandling::SyncCThrow),
    ];
    const FALLBACK: Self = ExceptionHandling::Sync;
}

impl EnumTable for Optimization {
    const WHAT: &'static str = "optimization";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("Disabled", Optimization::Disabled),
        ("MinSpace", Optimization::MinSpace),
        ("MaxSpeed", Optimization::MaxSpeed),
        ("Full", Optimization::Full),
    ];
    const FALLBACK: Self = Optimization::Disabled;
}

impl EnumTable for WarningLevel {
    const WHAT: &'static str = "warning level";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("TurnOffAllWarnings", WarningLevel::Off),
        ("Level1", WarningLevel::Level1),
        ("Level2", WarningLevel::Level2),
        ("Level3", WarningLevel::Level3),
        ("Level4", WarningLevel::Level4),
        ("EnableAllWarnings", WarningLevel::All),
    ];
    const FALLBACK: Self = WarningLevel::Level3;
}

impl EnumTable for PchMode {
    const WHAT: &'static str = "precompiled header mode";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("NotUsing", PchMode::NotUsing),
        ("Create", PchMode::Create),
        ("Use", PchMode::Use),
    ];
    const FALLBACK: Self = PchMode::NotUsing;
}

impl EnumTable for RuntimeLibrary {
    const WHAT: &'static str = "runtime library";
    const TABLE: &'static [(&'static str, Self)] = &[
        ("MultiThreaded", RuntimeLibrary::MultiThreaded),
        ("MultiThreadedDebug", RuntimeLibrary::MultiThreadedDebug),
        ("MultiThreadedDLL", RuntimeLibrary::MultiThreadedDll),
        ("MultiThreadedDebugDLL", RuntimeLibrary::MultiThreadedDebugDll),
    ];
    const FALLBACK: Self = RuntimeLibrary::MultiThreadedDll;
}

/// 把宏定义列表项 `KEY=VALUE` 拆开
pub(crate) fn split_define(item: &str) -> (String, String) {
    match item.split_once('=') {
        Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
        None => (item.trim().to_string(), String::new()),
    }
}

/// 解析旧格式文档
pub fn parse_vcproj_str(xml: &str) -> Result<ParseOutcome, roxmltree::Error> {
    let doc = Document::parse(xml)?;
    let mut outcome = ParseOutcome::default();
    outcome.projects = vcproj::parse(&doc, &mut outcome.log);
    Ok(outcome)
}

/// 解析新格式文档及（可选的）过滤器伴随文档
pub fn parse_vcxproj_str(
    xml: &str,
    filters_xml: Option<&str>,
    fallback_name: &str,
) -> Result<ParseOutcome, roxmltree::Error> {
    let doc = Document::parse(xml)?;
    let filters_doc = filters_xml.map(Document::parse).transpose()?;
    let mut outcome = ParseOutcome::default();
    outcome.projects = vcxproj::parse(&doc, filters_doc.as_ref(), fallback_name, &mut outcome.log);
    Ok(outcome)
}

fn read_required(path: &Path) -> Result<String, ConvertError> {
    std::fs::read_to_string(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// 读取可选文件：不存在返回 Ok(None)，其它 I/O 错误照常返回
fn read_optional(path: &Path) -> Result<Option<String>, ConvertError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConvertError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn xml_error(path: &Path) -> impl FnOnce(roxmltree::Error) -> ConvertError {
    let path = path.to_path_buf();
    move |source| ConvertError::Xml { path, source }
}

pub fn filters_path(project_path: &Path) -> PathBuf {
    let mut name = project_path.as_os_str().to_owned();
    name.push(FILTERS_SUFFIX);
    PathBuf::from(name)
}

/// 读取并解析工程文件，按扩展名选择方言
pub fn parse_project_file(path: &Path) -> Result<ParseOutcome, ConvertError> {
    let dialect =
        dialect_for_path(path).ok_or_else(|| ConvertError::UnsupportedProjectType(path.to_path_buf()))?;
    debug!("Parsing {} as {:?}", path.display(), dialect);

    let content = read_required(path)?;
    let doc = Document::parse(&content).map_err(xml_error(path))?;

    let mut outcome = ParseOutcome::default();
    match dialect {
        Dialect::Vcproj => {
            outcome.projects = vcproj::parse(&doc, &mut outcome.log);
        }
        Dialect::Vcxproj => {
            let companion = filters_path(path);
            let filters_content = read_optional(&companion)?;
            if filters_content.is_none() {
                info!(
                    "No filters file {}, files stay ungrouped",
                    companion.display()
                );
            }
            let filters_doc = filters_content
                .as_deref()
                .map(Document::parse)
                .transpose()
                .map_err(xml_error(&companion))?;
            let fallback_name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("project");
            outcome.projects =
                vcxproj::parse(&doc, filters_doc.as_ref(), fallback_name, &mut outcome.log);
        }
    }

    if outcome.projects.is_empty() {
        return Err(ConvertError::NoProject(path.to_path_buf()));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_registry() {
        assert_eq!(dialect_for_path(Path::new("a/hello.vcproj")), Some(Dialect::Vcproj));
        assert_eq!(dialect_for_path(Path::new("hello.VCXPROJ")), Some(Dialect::Vcxproj));
        assert_eq!(dialect_for_path(Path::new("hello.sln")), None);
        assert_eq!(dialect_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_decode_enum_both_encodings_agree() {
        assert_eq!(decode_enum::<TargetKind>("1"), TargetKind::Application);
        assert_eq!(decode_enum::<TargetKind>("Application"), TargetKind::Application);
        assert_eq!(decode_enum::<TargetKind>("4"), TargetKind::StaticLibrary);
        assert_eq!(decode_enum::<TargetKind>("staticlibrary"), TargetKind::StaticLibrary);
        assert_eq!(decode_enum::<CharacterSet>("2"), CharacterSet::Mbcs);
        assert_eq!(decode_enum::<CharacterSet>("MultiByte"), CharacterSet::Mbcs);
        assert_eq!(decode_enum::<WarningLevel>("4"), WarningLevel::Level4);
        assert_eq!(decode_enum::<WarningLevel>("Level4"), WarningLevel::Level4);
        assert_eq!(decode_enum::<PchMode>("2"), PchMode::Use);
        assert_eq!(decode_enum::<PchMode>("Use"), PchMode::Use);
    }

    #[test]
    fn test_decode_enum_unknown_falls_back() {
        assert_eq!(decode_enum::<TargetKind>("10"), TargetKind::Unknown);
        assert_eq!(decode_enum::<TargetKind>("Utility"), TargetKind::Unknown);
        assert_eq!(decode_enum::<Optimization>("Ludicrous"), Optimization::Disabled);
        assert_eq!(decode_enum::<PchMode>(""), PchMode::NotUsing);
    }

    #[test]
    fn test_classify_file() {
        assert_eq!(classify_file("gen/generated_parser.y"), Some(SkipReason::JunkExtension));
        assert_eq!(classify_file("res/app.ico"), Some(SkipReason::JunkExtension));
        assert_eq!(classify_file("ReadMe.txt"), Some(SkipReason::JunkExtension));
        assert_eq!(classify_file("server_i.c"), Some(SkipReason::IdlGenerated));
        assert_eq!(classify_file("dlldata.c"), Some(SkipReason::IdlGenerated));
        assert_eq!(classify_file("../lib/zlib.lib"), Some(SkipReason::LibrarySource));
        assert_eq!(classify_file("src/main.cpp"), None);
        assert_eq!(classify_file("src/main.h"), None);
    }

    #[test]
    fn test_generated_files_filter_names() {
        assert!(is_generated_files_filter("Generated Files"));
        assert!(is_generated_files_filter("Generierte Dateien"));
        assert!(!is_generated_files_filter("Source Files"));
    }

    #[test]
    fn test_split_define() {
        assert_eq!(split_define("FOO=1"), ("FOO".to_string(), "1".to_string()));
        assert_eq!(split_define("BAR"), ("BAR".to_string(), String::new()));
        assert_eq!(split_define("X=a=b"), ("X".to_string(), "a=b".to_string()));
    }

    #[test]
    fn test_filters_path() {
        assert_eq!(
            filters_path(Path::new("dir/app.vcxproj")),
            PathBuf::from("dir/app.vcxproj.filters")
        );
    }

    #[test]
    fn test_missing_project_file_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = parse_project_file(&dir.path().join("absent.vcproj")).unwrap_err();
        assert!(matches!(err, ConvertError::Read { .. }));
    }

    #[test]
    fn test_missing_companion_is_tolerated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.vcxproj");
        std::fs::write(
            &path,
            r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup Label="ProjectConfigurations">
    <ProjectConfiguration Include="Debug|Win32">
      <Configuration>Debug</Configuration>
      <Platform>Win32</Platform>
    </ProjectConfiguration>
  </ItemGroup>
</Project>"#,
        )
        .unwrap();
        let outcome = parse_project_file(&path).unwrap();
        assert_eq!(outcome.projects.len(), 1);
        assert_eq!(outcome.projects[0].name, "app");
    }
}
