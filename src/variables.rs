//! IDE 构建宏 `$(Name)` 到 CMake 表达式的转换。

use log::warn;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// 宏名的格式，`$` 或括号不满足此格式时原样保留
static MACRO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)").expect("macro pattern is valid")
});

/// `$(PlatformName)` 需要的推导逻辑，由调用方在脚本中输出一次
pub const PLATFORM_DERIVATION: &[&str] = &[
    "if(NOT V2C_BUILD_PLATFORM)",
    "  if(CMAKE_SIZEOF_VOID_P EQUAL 8)",
    "    set(V2C_BUILD_PLATFORM x64)",
    "  else()",
    "    set(V2C_BUILD_PLATFORM Win32)",
    "  endif()",
    "endif()",
];

/// 变量转换器。每个工程一份，记录是否需要输出平台推导块。
#[derive(Debug)]
pub struct VariableTranslator {
    project_name: String,
    project_file_name: String,
    needs_platform_block: bool,
}

impl VariableTranslator {
    pub fn new(project_name: &str, project_file_name: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            project_file_name: project_file_name.to_string(),
            needs_platform_block: false,
        }
    }

    /// 是否遇到过平台名宏（需要在脚本中输出 PLATFORM_DERIVATION）
    pub fn needs_platform_block(&self) -> bool {
        self.needs_platform_block
    }

    pub fn require_platform_block(&mut self) {
        self.needs_platform_block = true;
    }

    fn replacement_for(&mut self, name: &str) -> String {
        match name.to_ascii_lowercase().as_str() {
            "configurationname" | "configuration" => "${CMAKE_CFG_INTDIR}".to_string(),
            "platformname" | "platform" => {
                self.needs_platform_block = true;
                "${V2C_BUILD_PLATFORM}".to_string()
            }
            "projectname" | "inputname" | "targetname" => "${PROJECT_NAME}".to_string(),
            "projectdir" => "${PROJECT_SOURCE_DIR}/".to_string(),
            "projectfilename" => self.project_file_name.clone(),
            "outdir" => "${CMAKE_CURRENT_BINARY_DIR}/${CMAKE_CFG_INTDIR}".to_string(),
            "solutiondir" => "${V2C_MASTER_PROJECT_SOURCE_DIR}/".to_string(),
            "targetpath" => "${CMAKE_CURRENT_BINARY_DIR}/${CMAKE_CFG_INTDIR}/${PROJECT_NAME}".to_string(),
            _ => {
                warn!(
                    "{}: unknown build macro $({}), falling back to environment variable",
                    self.project_name, name
                );
                format!("$ENV{{{}}}", name)
            }
        }
    }

    /// 替换字符串中所有 `$(Name)` 宏。已转换过的文本不含 `$(`，再次转换不会变化。
    pub fn translate(&mut self, input: &str) -> String {
        if !input.contains("$(") {
            return input.to_string();
        }
        MACRO_RE
            .replace_all(input, |caps: &Captures| self.replacement_for(&caps[1]))
            .into_owned()
    }
}
