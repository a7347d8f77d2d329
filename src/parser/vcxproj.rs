//! 新格式（元素风格）解析。
//!
//! 配置由 `ProjectConfigurations` 项组统一声明，编译/链接设置放在按条件区分的
//! `ItemDefinitionGroup` 中。文件列表和过滤器树分布在工程文件和 `.filters`
//! 伴随文件里：先解析工程文件得到原始项组，再用伴随文件合并——项组容器是追加，
//! 已知项的内容则整体被伴随文件的版本替换。

use log::{debug, info, warn};
use roxmltree::{Document, Node};

use super::{
    ParseLog, SkipReason, classify_file, decode_enum, is_generated_files_filter, parse_bool,
    split_define,
};
use crate::models::{
    CompilerSettings, Configuration, Dialect, FileConfigOverride, FileEntry, FilterNode, FilterTree,
    IncludeDir, LinkerSettings, Project, RuntimeLibrary,
};
use crate::utils::{normalize_path, split_list, strip_lib_extension};

const PARSER: &str = "vcxproj";

/// 会进入文件树的项类型
const FILE_ITEM_KINDS: &[&str] = &[
    "ClCompile",
    "ClInclude",
    "ResourceCompile",
    "CustomBuild",
    "None",
    "Midl",
    "Text",
    "Image",
    "Xml",
    "Manifest",
    "Library",
    "MASM",
];

/// 不是文件的项类型
const NON_FILE_ITEM_KINDS: &[&str] = &[
    "ProjectReference",
    "Reference",
    "COMReference",
    "ProjectCapability",
    "Filter",
];

/// 过滤器项上认识的元数据
const FILTER_METADATA: &[&str] = &["UniqueIdentifier", "Extensions", "SourceControlFiles", "ParseFiles"];

const KNOWN_ITEM_METADATA: &[&str] = &[
    "Filter",
    "ExcludedFromBuild",
    "PrecompiledHeader",
    "PrecompiledHeaderFile",
    "SubType",
    "DependentUpon",
    "Command",
    "Message",
    "Outputs",
    "AdditionalInputs",
    "FileType",
    "DeploymentContent",
    "ObjectFileName",
    "LinkObjects",
    "AdditionalIncludeDirectories",
    "PreprocessorDefinitions",
    "DisableSpecificWarnings",
    "ForcedIncludeFiles",
    "CompileAs",
    "WarningLevel",
    "Optimization",
    "TreatOutputAsContent",
];

const IGNORED_PROJECT_ELEMENTS: &[&str] = &[
    "Import",
    "ImportGroup",
    "ProjectExtensions",
    "Target",
    "UsingTask",
];

const IGNORED_GLOBALS: &[&str] = &[
    "VCProjectVersion",
    "WindowsTargetPlatformVersion",
    "TargetFrameworkVersion",
    "ProjectGuid_",
    "VCTargetsPath",
    "IgnoreWarnCompileDuplicatedFilename",
];

const IGNORED_CONFIGURATION_PROPERTIES: &[&str] = &[
    "PlatformToolset",
    "CLRSupport",
    "SpectreMitigation",
    "VCToolsVersion",
    "EnableASAN",
    "PreferredToolArchitecture",
];

const IGNORED_GENERAL_PROPERTIES: &[&str] = &[
    "_ProjectFileVersion",
    "OutDir",
    "IntDir",
    "TargetName",
    "TargetExt",
    "GenerateManifest",
    "EmbedManifest",
    "IncludePath",
    "LibraryPath",
    "ExecutablePath",
    "CodeAnalysisRuleSet",
    "CodeAnalysisRules",
    "CodeAnalysisRuleAssemblies",
    "RunCodeAnalysis",
    "IgnoreImportLibrary",
    "LinkKeyFile",
    "LinkDelaySign",
    "ExtensionsToDeleteOnClean",
    "PostBuildEventUseInBuild",
    "PreBuildEventUseInBuild",
    "PreLinkEventUseInBuild",
];

const IGNORED_TOOL_DEFINITIONS: &[&str] = &[
    "ResourceCompile",
    "Midl",
    "PreBuildEvent",
    "PostBuildEvent",
    "PreLinkEvent",
    "Manifest",
    "Bscmake",
    "ProjectReference",
    "CustomBuildStep",
    "Xdcmake",
];

const IGNORED_COMPILER_ELEMENTS: &[&str] = &[
    "MinimalRebuild",
    "BasicRuntimeChecks",
    "DebugInformationFormat",
    "ProgramDataBaseFileName",
    "ObjectFileName",
    "AssemblerListingLocation",
    "BrowseInformation",
    "FunctionLevelLinking",
    "IntrinsicFunctions",
    "FavorSizeOrSpeed",
    "OmitFramePointers",
    "StringPooling",
    "BufferSecurityCheck",
    "CompileAs",
    "TreatWChar_tAsBuiltInType",
    "ForceConformanceInForLoopScope",
    "SuppressStartupBanner",
    "WholeProgramOptimization",
    "EnableEnhancedInstructionSet",
    "FloatingPointModel",
    "InlineFunctionExpansion",
    "SmallerTypeCheck",
    "StructMemberAlignment",
    "ForcedIncludeFiles",
    "CallingConvention",
    "ShowIncludes",
    "OpenMPSupport",
    "DisableLanguageExtensions",
    "MultiProcessorCompilation",
    "SDLCheck",
    "ConformanceMode",
    "LanguageStandard",
    "ErrorReporting",
];

const IGNORED_LINKER_ELEMENTS: &[&str] = &[
    "OutputFile",
    "GenerateDebugInformation",
    "SubSystem",
    "TargetMachine",
    "ImportLibrary",
    "RandomizedBaseAddress",
    "DataExecutionPrevention",
    "EnableCOMDATFolding",
    "IgnoreSpecificDefaultLibraries",
    "IgnoreAllDefaultLibraries",
    "LinkTimeCodeGeneration",
    "SuppressStartupBanner",
    "MapFileName",
    "GenerateMapFile",
    "StackReserveSize",
    "HeapReserveSize",
    "BaseAddress",
    "DelayLoadDLLs",
    "EntryPointSymbol",
    "UACExecutionLevel",
    "LargeAddressAware",
    "ErrorReporting",
];

#[derive(Debug, Clone)]
struct ItemMeta {
    name: String,
    condition: Option<String>,
    value: String,
}

#[derive(Debug, Clone)]
struct Item {
    kind: String,
    include: String,
    metadata: Vec<ItemMeta>,
}

impl Item {
    fn same_item(&self, other: &Item) -> bool {
        self.kind == other.kind && normalize_path(&self.include).eq_ignore_ascii_case(&normalize_path(&other.include))
    }

    fn meta(&self, name: &str) -> Option<&ItemMeta> {
        self.metadata.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Default)]
struct ItemGroup {
    label: Option<String>,
    items: Vec<Item>,
}

/// 第一遍解析后、合并伴随文件前的工程
struct PendingProject {
    project: Project,
    item_groups: Vec<ItemGroup>,
}

fn name_of<'a>(node: &Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

fn text_of<'a>(node: &Node<'a, '_>) -> &'a str {
    node.text().unwrap_or_default().trim()
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn project_elements<'a, 'input>(doc: &'a Document<'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    std::iter::once(doc.root_element()).filter(|n| name_of(n) == "Project")
}

pub(super) fn parse(
    doc: &Document,
    filters_doc: Option<&Document>,
    fallback_name: &str,
    log: &mut ParseLog,
) -> Vec<Project> {
    let mut pending: Vec<PendingProject> = project_elements(doc)
        .map(|node| parse_primary(node, log))
        .collect();

    if let Some(filters_doc) = filters_doc {
        for (index, node) in project_elements(filters_doc).enumerate() {
            match pending.get_mut(index) {
                Some(target) => merge_companion(node, &mut target.item_groups, log),
                None => warn!("{}: filters file has no matching project #{}", PARSER, index),
            }
        }
    }

    pending
        .into_iter()
        .map(|p| finish(p, fallback_name, log))
        .collect()
}

fn parse_primary(node: Node, log: &mut ParseLog) -> PendingProject {
    let mut project = Project::new(Dialect::Vcxproj);
    let mut item_groups = Vec::new();

    for child in elements(node) {
        let label = child.attribute("Label");
        let condition = child.attribute("Condition");
        match (name_of(&child), label) {
            ("ItemGroup", Some("ProjectConfigurations")) => parse_project_configurations(child, &mut project, log),
            ("ItemGroup", _) => item_groups.push(parse_item_group(child)),
            ("PropertyGroup", Some("Globals")) => parse_globals(child, &mut project, log),
            ("PropertyGroup", Some("Configuration")) => {
                for index in select_configurations(&project, condition) {
                    parse_configuration_properties(child, &mut project.configurations[index], log);
                }
            }
            ("PropertyGroup", Some("UserMacros")) => {}
            ("PropertyGroup", _) => {
                for index in select_configurations(&project, condition) {
                    parse_general_properties(child, &mut project.configurations[index], log);
                }
            }
            ("ItemDefinitionGroup", _) => {
                for index in select_configurations(&project, condition) {
                    parse_item_definitions(child, &mut project.configurations[index], log);
                }
            }
            (name, _) if IGNORED_PROJECT_ELEMENTS.contains(&name) => {}
            (name, _) => log.unknown_element(PARSER, "Project", name),
        }
    }

    PendingProject { project, item_groups }
}

fn parse_project_configurations(node: Node, project: &mut Project, log: &mut ParseLog) {
    for entry in elements(node) {
        if name_of(&entry) != "ProjectConfiguration" {
            log.unknown_element(PARSER, "ItemGroup", name_of(&entry));
            continue;
        }
        let mut config = Configuration::from_combined_name(entry.attribute("Include").unwrap_or_default());
        for field in elements(entry) {
            match name_of(&field) {
                "Configuration" => config.build_type = text_of(&field).to_string(),
                "Platform" => config.platform = text_of(&field).to_string(),
                name => log.unknown_element(PARSER, "ProjectConfiguration", name),
            }
        }
        debug!("Declared configuration {}", config.full_name());
        project.configurations.push(config);
    }
}

fn parse_globals(node: Node, project: &mut Project, log: &mut ParseLog) {
    for field in elements(node) {
        let value = text_of(&field).to_string();
        match name_of(&field) {
            "ProjectName" => project.name = value,
            "ProjectGuid" => project.guid = Some(value),
            "RootNamespace" => project.root_namespace = Some(value),
            "Keyword" => project.keyword = Some(value),
            "SccProjectName" => project.scc.project_name = Some(value),
            "SccLocalPath" => project.scc.local_path = Some(value),
            "SccProvider" => project.scc.provider = Some(value),
            "SccAuxPath" => project.scc.aux_path = Some(value),
            name if IGNORED_GLOBALS.contains(&name) => {}
            name => log.unknown_element(PARSER, "PropertyGroup Globals", name),
        }
    }
}

/// 从 `'$(Configuration)|$(Platform)'=='Debug|Win32'` 这类条件中取出配置和平台
fn parse_condition(condition: &str) -> Option<(String, Option<String>)> {
    let (_, rhs) = condition.split_once("==")?;
    let rhs = rhs.trim().trim_matches('\'').trim();
    match rhs.split_once('|') {
        Some((build_type, platform)) => Some((build_type.to_string(), Some(platform.to_string()))),
        None => Some((rhs.to_string(), None)),
    }
}

/// 条件对应的配置下标；没有条件时对应全部配置
fn select_configurations(project: &Project, condition: Option<&str>) -> Vec<usize> {
    let Some(condition) = condition else {
        return (0..project.configurations.len()).collect();
    };
    let Some((build_type, platform)) = parse_condition(condition) else {
        warn!("{}: cannot interpret condition {}", PARSER, condition);
        return Vec::new();
    };
    let selected: Vec<usize> = project
        .configurations
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.build_type == build_type && platform.as_deref().is_none_or(|p| c.platform == p)
        })
        .map(|(i, _)| i)
        .collect();
    if selected.is_empty() {
        warn!("{}: condition {} matches no declared configuration", PARSER, condition);
    }
    selected
}

fn parse_configuration_properties(node: Node, config: &mut Configuration, log: &mut ParseLog) {
    for field in elements(node) {
        let value = text_of(&field);
        match name_of(&field) {
            "ConfigurationType" => config.kind = decode_enum(value),
            "UseDebugLibraries" => config.debug_runtime = parse_bool(value),
            "CharacterSet" => config.charset = decode_enum(value),
            "UseOfMfc" => config.use_mfc = decode_enum(value),
            "UseOfAtl" => config.use_atl = decode_enum(value),
            "WholeProgramOptimization" => config.whole_program_optimization = parse_bool(value),
            name if IGNORED_CONFIGURATION_PROPERTIES.contains(&name) => {}
            name => log.unknown_element(PARSER, "PropertyGroup Configuration", name),
        }
    }
}

fn parse_general_properties(node: Node, config: &mut Configuration, log: &mut ParseLog) {
    for field in elements(node) {
        match name_of(&field) {
            "LinkIncremental" => linker_of(config).incremental = parse_bool(text_of(&field)),
            name if IGNORED_GENERAL_PROPERTIES.contains(&name) => {}
            name => log.unknown_element(PARSER, "PropertyGroup", name),
        }
    }
}

fn compiler_of(config: &mut Configuration) -> &mut CompilerSettings {
    if config.compilers.is_empty() {
        config.compilers.push(CompilerSettings::default());
    }
    &mut config.compilers[0]
}

fn linker_of(config: &mut Configuration) -> &mut LinkerSettings {
    if config.linkers.is_empty() {
        config.linkers.push(LinkerSettings::default());
    }
    &mut config.linkers[0]
}

/// 列表值，去掉 `%(...)` 继承占位
fn list_value(value: &str) -> Vec<String> {
    split_list(value, &[';'])
        .into_iter()
        .filter(|item| !item.starts_with("%("))
        .collect()
}

fn parse_item_definitions(node: Node, config: &mut Configuration, log: &mut ParseLog) {
    for tool in elements(node) {
        match name_of(&tool) {
            "ClCompile" => {
                for field in elements(tool) {
                    parse_compiler_element(name_of(&field), text_of(&field), config, log);
                }
            }
            "Link" | "Lib" => {
                let tool_name = name_of(&tool);
                for field in elements(tool) {
                    parse_linker_element(tool_name, name_of(&field), text_of(&field), linker_of(config), log);
                }
            }
            name if IGNORED_TOOL_DEFINITIONS.contains(&name) => {}
            name => log.unknown_element(PARSER, "ItemDefinitionGroup", name),
        }
    }
}

fn parse_compiler_element(name: &str, value: &str, config: &mut Configuration, log: &mut ParseLog) {
    if name == "RuntimeLibrary" {
        config.debug_runtime = decode_enum::<RuntimeLibrary>(value).is_debug();
        return;
    }

    let compiler = compiler_of(config);
    match name {
        "AdditionalIncludeDirectories" => {
            compiler.include_dirs = list_value(value)
                .iter()
                .map(|dir| IncludeDir::new(normalize_path(dir)))
                .collect();
        }
        "PreprocessorDefinitions" => {
            for item in list_value(value) {
                let (key, value) = split_define(&item);
                compiler.defines.insert(key, value);
            }
        }
        "RuntimeTypeInfo" => compiler.rtti = parse_bool(value),
        "ExceptionHandling" => compiler.exception_handling = decode_enum(value),
        "Optimization" => compiler.optimization = decode_enum(value),
        "WarningLevel" => compiler.warning_level = decode_enum(value),
        "TreatWarningAsError" => compiler.warnings_as_errors = parse_bool(value),
        "PrecompiledHeader" => compiler.pch.mode = decode_enum(value),
        "PrecompiledHeaderFile" => compiler.pch.header = Some(normalize_path(value)),
        "PrecompiledHeaderOutputFile" => compiler.pch.binary = Some(normalize_path(value)),
        "DisableSpecificWarnings" => compiler.specific.disabled_warnings = list_value(value),
        "AdditionalOptions" => {
            compiler.specific.flags = value
                .split_whitespace()
                .filter(|flag| !flag.starts_with("%("))
                .map(str::to_string)
                .collect();
        }
        name if IGNORED_COMPILER_ELEMENTS.contains(&name) => {}
        name => log.unknown_element(PARSER, "ClCompile", name),
    }
}

fn parse_linker_element(tool: &str, name: &str, value: &str, linker: &mut LinkerSettings, log: &mut ParseLog) {
    match name {
        "AdditionalDependencies" => {
            linker.dependencies = list_value(value)
                .iter()
                .map(|dep| strip_lib_extension(dep))
                .collect();
        }
        "AdditionalLibraryDirectories" => {
            linker.library_dirs = list_value(value).iter().map(|dir| normalize_path(dir)).collect();
        }
        "ModuleDefinitionFile" => linker.module_definition_file = Some(normalize_path(value)),
        "ProgramDatabaseFile" => linker.program_database = Some(normalize_path(value)),
        "OptimizeReferences" => linker.optimize_references = parse_bool(value),
        "AdditionalOptions" => {
            linker.specific.flags = value
                .split_whitespace()
                .filter(|flag| !flag.starts_with("%("))
                .map(str::to_string)
                .collect();
        }
        name if IGNORED_LINKER_ELEMENTS.contains(&name) => {}
        name => log.unknown_element(PARSER, tool, name),
    }
}

fn parse_item_group(node: Node) -> ItemGroup {
    let items = elements(node)
        .map(|item| Item {
            kind: name_of(&item).to_string(),
            include: item.attribute("Include").unwrap_or_default().to_string(),
            metadata: elements(item)
                .map(|meta| ItemMeta {
                    name: name_of(&meta).to_string(),
                    condition: meta.attribute("Condition").map(str::to_string),
                    value: text_of(&meta).to_string(),
                })
                .collect(),
        })
        .collect();

    ItemGroup {
        label: node.attribute("Label").map(str::to_string),
        items,
    }
}

/// 合并伴随文件：已知项的内容整体替换，新项作为新的项组追加
fn merge_companion(node: Node, groups: &mut Vec<ItemGroup>, log: &mut ParseLog) {
    for child in elements(node) {
        if name_of(&child) != "ItemGroup" {
            if !matches!(name_of(&child), "PropertyGroup" | "Import") {
                log.unknown_element(PARSER, "Project (filters)", name_of(&child));
            }
            continue;
        }

        let incoming = parse_item_group(child);
        let mut new_items = Vec::new();
        for item in incoming.items {
            let existing = groups
                .iter_mut()
                .flat_map(|g| g.items.iter_mut())
                .find(|known| known.same_item(&item));
            match existing {
                Some(known) => known.metadata = item.metadata,
                None => new_items.push(item),
            }
        }
        if !new_items.is_empty() {
            groups.push(ItemGroup {
                label: incoming.label,
                items: new_items,
            });
        }
    }
}

/// 按 `A\B\C` 路径找到或创建过滤器节点
fn ensure_filter(tree: &mut FilterTree, path: &str) -> usize {
    let mut current = FilterTree::ROOT;
    for segment in path.split(['\\', '/']).filter(|s| !s.is_empty()) {
        let existing = tree
            .node(current)
            .children
            .iter()
            .copied()
            .find(|&child| tree.node(child).name.eq_ignore_ascii_case(segment));
        current = match existing {
            Some(child) => child,
            None => tree.add_child(current, FilterNode::new(segment)),
        };
    }
    current
}

/// 过滤器（或其祖先）是否要求跳过其中的文件
fn filter_skip_reason(tree: &FilterTree, index: usize) -> Option<SkipReason> {
    let mut current = Some(index);
    while let Some(i) = current {
        if i == FilterTree::ROOT {
            break;
        }
        let node = tree.node(i);
        if is_generated_files_filter(&node.name) {
            return Some(SkipReason::GeneratedFilesFilter);
        }
        if !node.scc_tracked {
            return Some(SkipReason::NotSourceControlled);
        }
        current = node.parent;
    }
    None
}

fn finish(pending: PendingProject, fallback_name: &str, log: &mut ParseLog) -> Project {
    let PendingProject {
        mut project,
        item_groups,
    } = pending;

    if project.name.is_empty() {
        project.name = project
            .root_namespace
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
    }

    let items: Vec<&Item> = item_groups.iter().flat_map(|g| g.items.iter()).collect();
    let mut tree = FilterTree::default();

    for item in items.iter().filter(|i| i.kind == "Filter") {
        let index = ensure_filter(&mut tree, &item.include);
        if let Some(ext) = item.meta("Extensions") {
            tree.node_mut(index).extensions = Some(split_list(&ext.value, &[';']));
        }
        if let Some(scc) = item.meta("SourceControlFiles") {
            tree.node_mut(index).scc_tracked = parse_bool(&scc.value);
        }
        for meta in &item.metadata {
            if !FILTER_METADATA.contains(&meta.name.as_str()) {
                log.unknown_element(PARSER, "Filter", &meta.name);
            }
        }
    }

    for item in items.iter().filter(|i| i.kind != "Filter") {
        if NON_FILE_ITEM_KINDS.contains(&item.kind.as_str()) {
            continue;
        }
        if !FILE_ITEM_KINDS.contains(&item.kind.as_str()) {
            log.unknown_element(PARSER, "ItemGroup", &item.kind);
            continue;
        }
        let path = normalize_path(&item.include);
        if path.is_empty() {
            continue;
        }

        let filter = match item.meta("Filter") {
            Some(meta) if !meta.value.is_empty() => ensure_filter(&mut tree, &meta.value),
            _ => FilterTree::ROOT,
        };
        if let Some(reason) = filter_skip_reason(&tree, filter).or_else(|| classify_file(&path)) {
            log.skip(&path, reason);
            continue;
        }

        let mut entry = FileEntry::new(path);
        for meta in &item.metadata {
            match meta.name.as_str() {
                "ExcludedFromBuild" if parse_bool(&meta.value) => {
                    entry.config_override = Some(FileConfigOverride {
                        excluded_from_build: true,
                    });
                }
                name if KNOWN_ITEM_METADATA.contains(&name) => {}
                name => log.unknown_element(PARSER, &item.kind, name),
            }
            if let Some(condition) = &meta.condition {
                debug!("{}: {} applies only when {}", entry.path, meta.name, condition);
            }
        }
        if item.kind == "CustomBuild" {
            entry.custom_build = Some("CustomBuild item".to_string());
        }
        if entry.is_excluded() {
            info!("{} is excluded from the build", entry.path);
        }
        tree.add_file(filter, entry);
    }

    tree.build_index();
    project.filters = tree;
    project.update_build_units();
    project
}
