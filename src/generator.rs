//! 目标脚本组装：把工程模型按固定顺序输出为一份完整的 CMakeLists.txt。

use log::{debug, warn};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Settings;
use crate::mappings::{ALL_PLATFORMS, MappingTable, Mappings, PlatformTokens};
use crate::models::{
    CharacterSet, CompilerSettings, Configuration, ExceptionHandling, FilterTree, LibraryUsage,
    LinkerSettings, Optimization, PchMode, Project, TargetKind, WarningLevel,
};
use crate::syntax::{CMakeWriter, quote_if_needed};
use crate::utils::{cmake_identifier, config_identifier};
use crate::variables::{PLATFORM_DERIVATION, VariableTranslator};

/// 生成文件的标记行。下游工具靠这一行区分生成文件和手写文件，文字不能改。
pub const GENERATED_MARKER: &str = "# This file was automatically generated by vcproj2cmake - DO NOT EDIT, changes will be lost on the next conversion!";

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 多平台工程中区分平台的 CMake 变量
const PLATFORM_VAR: &str = "V2C_BUILD_PLATFORM";

const POLICIES: &[(&str, &str)] = &[("CMP0005", "NEW"), ("CMP0043", "OLD")];

/// 用户扩展点，生成脚本以 OPTIONAL 方式 include 对应的 hook 文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    PreProject,
    PostSources,
    PostDefinitions,
    PostTarget,
}

impl HookPoint {
    pub fn file_name(self) -> &'static str {
        match self {
            HookPoint::PreProject => "hook_pre_project.txt",
            HookPoint::PostSources => "hook_post_sources.txt",
            HookPoint::PostDefinitions => "hook_post_definitions.txt",
            HookPoint::PostTarget => "hook_post_target.txt",
        }
    }
}

/// 映射表平台桶 -> 条件；"ALL" 对应空条件
fn bucket_condition(platform: &str) -> Option<String> {
    (platform != ALL_PLATFORMS).then(|| platform.to_string())
}

/// 按平台桶输出，每个桶包在自己的条件块里
fn write_by_platform<F>(w: &mut CMakeWriter, tokens: &PlatformTokens, mut emit: F)
where
    F: FnMut(&mut CMakeWriter, &[String]),
{
    for (platform, list) in tokens.iter() {
        let condition = bucket_condition(platform);
        w.with_conditional(condition.as_deref(), |w| emit(w, list));
    }
}

/// MSVC 编译选项
pub fn msvc_compile_flags(compiler: &CompilerSettings, whole_program_optimization: bool) -> Vec<String> {
    let mut flags: Vec<String> = Vec::new();

    flags.push(
        match compiler.warning_level {
            WarningLevel::Off => "/W0",
            WarningLevel::Level1 => "/W1",
            WarningLevel::Level2 => "/W2",
            WarningLevel::Level3 => "/W3",
            WarningLevel::Level4 => "/W4",
            WarningLevel::All => "/Wall",
        }
        .to_string(),
    );
    if compiler.warnings_as_errors {
        flags.push("/WX".to_string());
    }
    flags.push(if compiler.rtti { "/GR" } else { "/GR-" }.to_string());
    match compiler.exception_handling {
        ExceptionHandling::Disabled => {}
        ExceptionHandling::Sync => flags.push("/EHsc".to_string()),
        ExceptionHandling::Async => flags.push("/EHa".to_string()),
        ExceptionHandling::SyncCThrow => flags.push("/EHs".to_string()),
    }
    flags.push(
        match compiler.optimization {
            Optimization::Disabled => "/Od",
            Optimization::MinSpace => "/O1",
            Optimization::MaxSpeed => "/O2",
            Optimization::Full => "/Ox",
        }
        .to_string(),
    );
    if whole_program_optimization {
        flags.push("/GL".to_string());
    }
    // 只处理 Use：Create 只对单个源文件有意义
    if compiler.pch.mode == PchMode::Use {
        flags.push(format!("/Yu{}", compiler.pch.header.as_deref().unwrap_or_default()));
        if let Some(binary) = &compiler.pch.binary {
            flags.push(format!("/Fp{}", binary));
        }
    }
    flags.extend(compiler.specific.disabled_warnings.iter().map(|w| format!("/wd{}", w)));
    flags.extend(compiler.specific.flags.iter().cloned());
    flags
}

/// MSVC 链接选项
pub fn msvc_link_flags(linker: &LinkerSettings, whole_program_optimization: bool) -> Vec<String> {
    let mut flags = vec![if linker.incremental {
        "/INCREMENTAL".to_string()
    } else {
        "/INCREMENTAL:NO".to_string()
    }];
    if linker.optimize_references {
        flags.push("/OPT:REF".to_string());
    }
    if whole_program_optimization {
        flags.push("/LTCG".to_string());
    }
    if let Some(def) = &linker.module_definition_file {
        flags.push(format!("/DEF:{}", def));
    }
    if let Some(pdb) = &linker.program_database {
        flags.push(format!("/PDB:{}", pdb));
    }
    flags.extend(linker.specific.flags.iter().cloned());
    flags
}

/// 字符集隐含的宏定义
fn charset_defines(charset: CharacterSet) -> &'static [&'static str] {
    match charset {
        CharacterSet::Sbcs => &[],
        CharacterSet::Unicode => &["_UNICODE", "UNICODE"],
        CharacterSet::Mbcs => &["_MBCS"],
    }
}

struct Assembler<'a> {
    project: &'a Project,
    settings: &'a Settings,
    mappings: &'a Mappings,
    project_file_name: &'a str,
    vars: VariableTranslator,
    target: String,
    multi_platform: bool,
}

impl<'a> Assembler<'a> {
    fn authoritative(&self) -> Option<&'a Configuration> {
        self.project
            .authoritative_configuration(&self.settings.authoritative_config)
    }

    /// 经过宏转换后再按映射表分桶
    fn map_tokens<'t, I>(&mut self, table: &MappingTable, tokens: I) -> PlatformTokens
    where
        I: IntoIterator<Item = &'t String>,
    {
        let mut result = PlatformTokens::new();
        for token in tokens {
            let translated = self.vars.translate(token);
            table.resolve_into(&translated, &mut result);
        }
        result
    }

    fn include_dirs_of(&mut self, config: &Configuration) -> PlatformTokens {
        let dirs: Vec<String> = config
            .compilers
            .iter()
            .flat_map(|c| c.include_dirs.iter().map(|d| d.path.clone()))
            .collect();
        let mappings = self.mappings;
        self.map_tokens(&mappings.include_dirs, &dirs)
    }

    fn library_dirs_of(&mut self, config: &Configuration) -> PlatformTokens {
        let dirs: Vec<String> = config
            .linkers
            .iter()
            .flat_map(|l| l.library_dirs.iter().cloned())
            .collect();
        let mappings = self.mappings;
        self.map_tokens(&mappings.library_dirs, &dirs)
    }

    fn dependencies_of(&mut self, config: &Configuration) -> PlatformTokens {
        let deps: Vec<String> = config
            .linkers
            .iter()
            .flat_map(|l| l.dependencies.iter().cloned())
            .collect();
        let mappings = self.mappings;
        self.map_tokens(&mappings.dependencies, &deps)
    }

    /// 宏定义按键查映射表；映射结果等于原键时保留 `KEY=VALUE`
    fn defines_of(&mut self, config: &Configuration) -> PlatformTokens {
        let mut defines: Vec<(String, String)> = Vec::new();
        for compiler in &config.compilers {
            for (key, value) in &compiler.defines {
                if !defines.iter().any(|(k, _)| k == key) {
                    defines.push((key.clone(), value.clone()));
                }
            }
        }
        for key in charset_defines(config.charset) {
            if !defines.iter().any(|(k, _)| k == key) {
                defines.push((key.to_string(), String::new()));
            }
        }

        let mut result = PlatformTokens::new();
        for (key, value) in defines {
            let value = self.vars.translate(&value);
            let resolved = self.mappings.defines.resolve(&key);
            for (platform, tokens) in resolved.iter() {
                for token in tokens {
                    if *token == key && !value.is_empty() {
                        result.push(platform, format!("{}={}", key, value));
                    } else {
                        result.push(platform, token.as_str());
                    }
                }
            }
        }
        result
    }

    fn write_header(&self, w: &mut CMakeWriter) {
        w.write_line(GENERATED_MARKER);
        if self.settings.emit_origin {
            w.write_comment(&format!(
                "Converted from {} by vcproj2cmake {}",
                self.project_file_name, VERSION
            ));
        }
        if self.settings.emit_timestamp {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            w.write_comment(&format!("Generated at {} (seconds since the Unix epoch)", secs));
        }
        w.write_empty_line();

        w.write_command("cmake_minimum_required", &["VERSION", &self.settings.min_cmake_version]);
        w.write_empty_line();

        for &(policy, value) in POLICIES {
            let condition = format!("POLICY {}", policy);
            w.with_conditional(Some(&condition), |w| {
                w.write_command("cmake_policy", &["SET", policy, value]);
            });
        }
        w.write_empty_line();

        w.with_conditional(Some("NOT V2C_MASTER_PROJECT_SOURCE_DIR"), |w| {
            w.write_set_var("V2C_MASTER_PROJECT_SOURCE_DIR", "${CMAKE_SOURCE_DIR}");
        });
        let local_dir = format!("${{CMAKE_CURRENT_SOURCE_DIR}}/{}", self.settings.mapping_dir_name);
        w.write_set_var("V2C_CONFIG_DIR_LOCAL", &local_dir);
        let module_dir = format!(
            "${{V2C_MASTER_PROJECT_SOURCE_DIR}}/{}/Modules",
            self.settings.mapping_dir_name
        );
        w.write_command(
            "list",
            &["APPEND", "CMAKE_MODULE_PATH", &module_dir, "${V2C_CONFIG_DIR_LOCAL}"],
        );
        w.write_include("vcproj2cmake_defs", true);
        w.write_empty_line();
    }

    fn write_hook(w: &mut CMakeWriter, point: HookPoint) {
        w.write_include(&format!("${{V2C_CONFIG_DIR_LOCAL}}/{}", point.file_name()), true);
    }

    fn write_directory_settings(&mut self, w: &mut CMakeWriter) {
        let Some(config) = self.authoritative() else {
            return;
        };

        match config.use_mfc {
            LibraryUsage::None => {}
            LibraryUsage::Static => w.write_set_var("CMAKE_MFC_FLAG", "1"),
            LibraryUsage::Dynamic => w.write_set_var("CMAKE_MFC_FLAG", "2"),
        }

        let includes = self.include_dirs_of(config);
        write_by_platform(w, &includes, |w, dirs| {
            w.write_command_list("include_directories", &[], dirs);
        });
        let lib_dirs = self.library_dirs_of(config);
        write_by_platform(w, &lib_dirs, |w, dirs| {
            w.write_command_list("link_directories", &[], dirs);
        });
        w.write_empty_line();
    }

    fn write_sources(&mut self, w: &mut CMakeWriter) {
        let tree = &self.project.filters;
        let mut nodes = vec![FilterTree::ROOT];
        nodes.extend(tree.walk());

        for index in nodes {
            let files: Vec<String> = tree
                .node(index)
                .files
                .iter()
                .filter(|f| !f.is_excluded())
                .map(|f| self.vars.translate(&f.path))
                .collect();
            if files.is_empty() {
                continue;
            }

            let group = tree.path_of(index);
            let var = if group.is_empty() {
                "SOURCES_files".to_string()
            } else {
                format!("SOURCES_files_{}", cmake_identifier(&group))
            };
            let var_ref = format!("${{{}}}", var);
            w.write_set_list(&var, &files);
            if !group.is_empty() {
                let group_name = format!("\"{}\"", group.replace('\\', "\\\\").replace('"', "\\\""));
                w.write_command_raw(
                    "source_group",
                    &[group_name, "FILES".to_string(), var_ref.clone()],
                );
            }
            w.write_command("list", &["APPEND", "SOURCES", &var_ref]);
        }
        Self::write_hook(w, HookPoint::PostSources);
        w.write_empty_line();
    }

    /// 创建目标，返回是否真的创建了
    fn write_target(&self, w: &mut CMakeWriter) -> bool {
        if !self.project.has_build_units {
            warn!("{}: no compilable sources, not creating a target", self.project.name);
            return false;
        }
        let kind = self.authoritative().map(|c| c.kind).unwrap_or_default();
        let target = self.target.as_str();
        match kind {
            TargetKind::Application => w.write_command("add_executable", &[target, "${SOURCES}"]),
            TargetKind::DynamicLibrary => {
                w.write_command("add_library", &[target, "SHARED", "${SOURCES}"])
            }
            TargetKind::StaticLibrary => {
                w.write_command("add_library", &[target, "STATIC", "${SOURCES}"])
            }
            TargetKind::Unknown => {
                warn!(
                    "{}: configuration type has no link language, not creating a target",
                    self.project.name
                );
                return false;
            }
        }
        true
    }

    fn write_link_libraries(&mut self, w: &mut CMakeWriter) {
        let Some(config) = self.authoritative() else {
            return;
        };
        let deps = self.dependencies_of(config);
        let target = self.target.clone();
        write_by_platform(w, &deps, |w, libs| {
            w.write_command_list("target_link_libraries", &[target.as_str()], libs);
        });
    }

    fn write_scc(&self, w: &mut CMakeWriter) {
        let scc = &self.project.scc;
        if !scc.is_present() {
            return;
        }
        let fields = [
            ("VS_SCC_PROJECTNAME", &scc.project_name),
            ("VS_SCC_LOCALPATH", &scc.local_path),
            ("VS_SCC_PROVIDER", &scc.provider),
            ("VS_SCC_AUXPATH", &scc.aux_path),
        ];
        for (property, value) in fields {
            if let Some(value) = value {
                w.write_property_set(&self.target, property, &value.replace('"', "\\\""));
            }
        }
    }

    fn write_configuration(&mut self, w: &mut CMakeWriter, config: &Configuration, directory_includes: &PlatformTokens) {
        let id = config_identifier(&config.build_type);
        let target = self.target.clone();
        debug!("Emitting configuration {} as {}", config.full_name(), id);

        w.write_comment(&format!("Configuration \"{}\"", config.full_name()));
        let platform_condition = self
            .multi_platform
            .then(|| format!("{} STREQUAL {}", PLATFORM_VAR, quote_if_needed(&config.platform)));
        w.write_conditional_if(platform_condition.as_deref());
        let target_condition = format!("TARGET {}", quote_if_needed(&target));
        w.write_conditional_if(Some(&target_condition));

        let defines = self.defines_of(config);
        let property = format!("COMPILE_DEFINITIONS_{}", id);
        write_by_platform(w, &defines, |w, values| {
            w.write_property_append(&target, &property, values);
        });

        let includes = self.include_dirs_of(config);
        for (platform, dirs) in includes.iter() {
            let already = directory_includes.get(platform).unwrap_or_default();
            let extra: Vec<String> = dirs
                .iter()
                .filter(|d| !already.contains(d))
                .map(|d| format!("$<$<CONFIG:{}>:{}>", id, d))
                .collect();
            let condition = bucket_condition(platform);
            w.with_conditional(condition.as_deref(), |w| {
                w.write_property_append(&target, "INCLUDE_DIRECTORIES", &extra);
            });
        }

        let compile_flags: Vec<String> = config
            .compilers
            .iter()
            .flat_map(|c| msvc_compile_flags(c, config.whole_program_optimization))
            .map(|flag| format!("$<$<CONFIG:{}>:{}>", id, self.vars.translate(&flag)))
            .collect();
        let link_flags: Vec<String> = config
            .linkers
            .iter()
            .flat_map(|l| msvc_link_flags(l, config.whole_program_optimization))
            .map(|flag| self.vars.translate(&flag))
            .collect();
        if !compile_flags.is_empty() || !link_flags.is_empty() {
            w.with_conditional(Some("MSVC"), |w| {
                w.write_property_append(&target, "COMPILE_OPTIONS", &compile_flags);
                if !link_flags.is_empty() {
                    let value = format!(" {}", link_flags.join(" "));
                    w.write_command(
                        "set_property",
                        &["TARGET", &target, "APPEND_STRING", "PROPERTY", &format!("LINK_FLAGS_{}", id), &value],
                    );
                }
            });
        }

        w.write_conditional_end(Some(&target_condition));
        w.write_conditional_end(platform_condition.as_deref());
        w.write_empty_line();
    }

    /// project() 之后的全部内容。平台推导块是否需要要等这些内容转换完才知道。
    fn write_body(&mut self, w: &mut CMakeWriter) {
        self.write_directory_settings(w);
        self.write_sources(w);

        Self::write_hook(w, HookPoint::PostDefinitions);
        w.write_empty_line();

        if self.write_target(w) {
            self.write_link_libraries(w);
            self.write_scc(w);
        }
        w.write_empty_line();

        let directory_includes = match self.authoritative() {
            Some(config) => self.include_dirs_of(config),
            None => PlatformTokens::new(),
        };
        let project = self.project;
        for config in &project.configurations {
            self.write_configuration(w, config, &directory_includes);
        }

        Self::write_hook(w, HookPoint::PostTarget);
    }
}

/// 生成一个工程的 CMakeLists.txt 文本。
///
/// 输出只依赖输入（不开启时间戳时），同一输入反复生成的结果逐字节相同。
pub fn generate_cmake_lists(
    project: &Project,
    mappings: &Mappings,
    settings: &Settings,
    project_file_name: &str,
) -> String {
    let multi_platform = project.platforms().len() > 1;
    let mut vars = VariableTranslator::new(&project.name, project_file_name);
    if multi_platform {
        vars.require_platform_block();
    }

    let mut assembler = Assembler {
        project,
        settings,
        mappings,
        project_file_name,
        vars,
        target: project.name.clone(),
        multi_platform,
    };

    let mut body = CMakeWriter::new();
    assembler.write_body(&mut body);

    let mut w = CMakeWriter::new();
    assembler.write_header(&mut w);
    Assembler::write_hook(&mut w, HookPoint::PreProject);
    w.write_command("project", &[project.name.as_str()]);
    w.write_empty_line();
    if assembler.vars.needs_platform_block() {
        for line in PLATFORM_DERIVATION {
            w.write_line(line);
        }
        w.write_empty_line();
    }

    let mut text = w.into_string();
    text.push_str(body.as_str());
    text
}
