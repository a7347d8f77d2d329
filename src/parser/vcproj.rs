//! 旧格式（属性风格）解析。设置写在 `<Tool Name="...">` 元素的属性上，
//! 枚举用整数表示，配置名为 `Build|Platform`。

use log::{debug, info};
use roxmltree::{Document, Node};

use super::{ParseLog, SkipReason, classify_file, decode_enum, is_generated_files_filter, parse_bool, split_define};
use crate::models::{
    CompilerSettings, Configuration, Dialect, FileConfigOverride, FileEntry, FilterNode, FilterTree,
    IncludeDir, LinkerSettings, Project, RuntimeLibrary,
};
use crate::utils::{normalize_path, split_list, strip_lib_extension};

const PARSER: &str = "vcproj";

const COMPILER_TOOL: &str = "VCCLCompilerTool";
const LINKER_TOOLS: &[&str] = &["VCLinkerTool", "VCLibrarianTool"];
const CUSTOM_BUILD_TOOL: &str = "VCCustomBuildTool";

/// 认识但不需要转换的工具
const IGNORED_TOOLS: &[&str] = &[
    "VCPreBuildEventTool",
    "VCPreLinkEventTool",
    "VCPostBuildEventTool",
    "VCXMLDataGeneratorTool",
    "VCWebServiceProxyGeneratorTool",
    "VCMIDLTool",
    "VCManagedResourceCompilerTool",
    "VCResourceCompilerTool",
    "VCALinkTool",
    "VCManifestTool",
    "VCXDCMakeTool",
    "VCBscMakeTool",
    "VCFxCopTool",
    "VCAppVerifierTool",
    "VCWebDeploymentTool",
    "VCManagedWrapperGeneratorTool",
    "VCAuxiliaryManagedWrapperGeneratorTool",
    "VCNMakeTool",
];

const IGNORED_PROJECT_ATTRIBUTES: &[&str] = &[
    "ProjectType",
    "Version",
    "TargetFrameworkVersion",
    "AssemblyReferenceSearchPaths",
];

/// `<File>` 上认识的属性
const FILE_ATTRIBUTES: &[&str] = &["RelativePath", "FileType", "SubType", "DeploymentContent"];

const IGNORED_PROJECT_ELEMENTS: &[&str] = &["Platforms", "ToolFiles", "References", "Globals"];

const IGNORED_CONFIGURATION_ATTRIBUTES: &[&str] = &[
    "OutputDirectory",
    "IntermediateDirectory",
    "ATLMinimizesCRunTimeLibraryUsage",
    "InheritedPropertySheets",
    "BuildLogFile",
    "ManagedExtensions",
    "DeleteExtensionsOnClean",
    "ExcludedFromBuild",
    "ReferencesPath",
];

const IGNORED_COMPILER_ATTRIBUTES: &[&str] = &[
    "MinimalRebuild",
    "BasicRuntimeChecks",
    "DebugInformationFormat",
    "Detect64BitPortabilityProblems",
    "ProgramDataBaseFileName",
    "ObjectFile",
    "AssemblerListingLocation",
    "BrowseInformation",
    "BrowseInformationFile",
    "EnableFunctionLevelLinking",
    "EnableIntrinsicFunctions",
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
    "FloatingPointExceptions",
    "GeneratePreprocessedFile",
    "InlineFunctionExpansion",
    "SmallerTypeCheck",
    "StructMemberAlignment",
    "UndefinePreprocessorDefinitions",
    "ForcedIncludeFiles",
    "CallingConvention",
    "ShowIncludes",
    "OpenMP",
    "DisableLanguageExtensions",
    "UseFullPaths",
    "ExpandAttributedSource",
    "AssemblerOutput",
    "XMLDocumentationFileName",
    "GenerateXMLDocumentationFiles",
    "IgnoreStandardIncludePath",
    "KeepComments",
    "ErrorReporting",
    "EnableFiberSafeOptimizations",
    "DefaultCharIsUnsigned",
    "CompileAsManaged",
    "UseUnicodeResponseFiles",
];

const IGNORED_LINKER_ATTRIBUTES: &[&str] = &[
    "OutputFile",
    "GenerateDebugInformation",
    "SubSystem",
    "TargetMachine",
    "GenerateManifest",
    "ManifestFile",
    "ImportLibrary",
    "RandomizedBaseAddress",
    "DataExecutionPrevention",
    "EnableCOMDATFolding",
    "IgnoreDefaultLibraryNames",
    "IgnoreAllDefaultLibraries",
    "LinkTimeCodeGeneration",
    "SuppressStartupBanner",
    "MapFileName",
    "GenerateMapFile",
    "MapExports",
    "StackReserveSize",
    "HeapReserveSize",
    "BaseAddress",
    "FixedBaseAddress",
    "DelayLoadDLLs",
    "LinkLibraryDependencies",
    "UseLibraryDependencyInputs",
    "UseUnicodeResponseFiles",
    "ErrorReporting",
    "AllowIsolation",
    "EntryPointSymbol",
    "ProfileGuidedDatabase",
    "TurnOffAssemblyGeneration",
    "AssemblyDebug",
    "UACExecutionLevel",
    "Version",
    "LargeAddressAware",
    "ResourceOnlyDLL",
    "SetChecksum",
    "SwapRunFromNet",
];

fn name_of<'a>(node: &Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

pub(super) fn parse(doc: &Document, log: &mut ParseLog) -> Vec<Project> {
    doc.descendants()
        .filter(|n| n.is_element() && name_of(n) == "VisualStudioProject")
        .map(|node| parse_project(node, log))
        .collect()
}

fn parse_project(node: Node, log: &mut ParseLog) -> Project {
    let mut project = Project::new(Dialect::Vcproj);

    for attr in node.attributes() {
        let value = attr.value().to_string();
        match attr.name() {
            "Name" => project.name = value,
            "ProjectGUID" => project.guid = Some(value),
            "RootNamespace" => project.root_namespace = Some(value),
            "Keyword" => project.keyword = Some(value),
            "SccProjectName" => project.scc.project_name = Some(value),
            "SccLocalPath" => project.scc.local_path = Some(value),
            "SccProvider" => project.scc.provider = Some(value),
            "SccAuxPath" => project.scc.aux_path = Some(value),
            name if IGNORED_PROJECT_ATTRIBUTES.contains(&name) => {}
            name => log.unknown_attribute(PARSER, "VisualStudioProject", name),
        }
    }
    debug!("Parsing project '{}'", project.name);

    for child in node.children().filter(|n| n.is_element()) {
        match name_of(&child) {
            "Configurations" => {
                for config_node in child.children().filter(|n| n.is_element()) {
                    if name_of(&config_node) == "Configuration" {
                        project.configurations.push(parse_configuration(config_node, log));
                    } else {
                        log.unknown_element(PARSER, "Configurations", name_of(&config_node));
                    }
                }
            }
            "Files" => {
                parse_filter_contents(child, &mut project.filters, FilterTree::ROOT, None, log);
            }
            name if IGNORED_PROJECT_ELEMENTS.contains(&name) => {}
            name => log.unknown_element(PARSER, "VisualStudioProject", name),
        }
    }

    project.filters.build_index();
    project.update_build_units();
    project
}

fn parse_configuration(node: Node, log: &mut ParseLog) -> Configuration {
    let mut config = Configuration::from_combined_name(node.attribute("Name").unwrap_or_default());

    for attr in node.attributes() {
        let value = attr.value();
        match attr.name() {
            "Name" => {}
            "ConfigurationType" => config.kind = decode_enum(value),
            "UseOfMFC" => config.use_mfc = decode_enum(value),
            "UseOfATL" => config.use_atl = decode_enum(value),
            "CharacterSet" => config.charset = decode_enum(value),
            "WholeProgramOptimization" => config.whole_program_optimization = parse_bool(value),
            name if IGNORED_CONFIGURATION_ATTRIBUTES.contains(&name) => {}
            name => log.unknown_attribute(PARSER, "Configuration", name),
        }
    }

    for tool in node.children().filter(|n| n.is_element()) {
        if name_of(&tool) != "Tool" {
            log.unknown_element(PARSER, "Configuration", name_of(&tool));
            continue;
        }
        match tool.attribute("Name").unwrap_or_default() {
            COMPILER_TOOL => {
                let compiler = parse_compiler_tool(tool, &mut config, log);
                config.compilers.push(compiler);
            }
            name if LINKER_TOOLS.contains(&name) => {
                config.linkers.push(parse_linker_tool(tool, log));
            }
            name if IGNORED_TOOLS.contains(&name) => {}
            name => log.unknown_element(PARSER, "Configuration", &format!("Tool Name={}", name)),
        }
    }

    config
}

fn parse_compiler_tool(tool: Node, config: &mut Configuration, log: &mut ParseLog) -> CompilerSettings {
    let mut compiler = CompilerSettings::default();

    for attr in tool.attributes() {
        let value = attr.value();
        match attr.name() {
            "Name" => {}
            "AdditionalIncludeDirectories" => {
                compiler.include_dirs = split_list(value, &[';', ','])
                    .iter()
                    .map(|dir| IncludeDir::new(normalize_path(dir)))
                    .collect();
            }
            "PreprocessorDefinitions" => {
                for item in split_list(value, &[';', ',']) {
                    let (key, value) = split_define(&item);
                    compiler.defines.insert(key, value);
                }
            }
            "RuntimeTypeInfo" => compiler.rtti = parse_bool(value),
            "ExceptionHandling" => compiler.exception_handling = decode_enum(value),
            "Optimization" => compiler.optimization = decode_enum(value),
            "WarningLevel" => compiler.warning_level = decode_enum(value),
            "WarnAsError" => compiler.warnings_as_errors = parse_bool(value),
            "UsePrecompiledHeader" => compiler.pch.mode = decode_enum(value),
            "PrecompiledHeaderThrough" => compiler.pch.header = Some(normalize_path(value)),
            "PrecompiledHeaderFile" => compiler.pch.binary = Some(normalize_path(value)),
            "RuntimeLibrary" => {
                config.debug_runtime = decode_enum::<RuntimeLibrary>(value).is_debug();
            }
            "DisableSpecificWarnings" => {
                compiler.specific.disabled_warnings = split_list(value, &[';', ',']);
            }
            "AdditionalOptions" => {
                compiler.specific.flags = value.split_whitespace().map(str::to_string).collect();
            }
            name if IGNORED_COMPILER_ATTRIBUTES.contains(&name) => {}
            name => log.unknown_attribute(PARSER, COMPILER_TOOL, name),
        }
    }

    compiler
}

/// 旧格式的三态值：0 默认，1 否，2 是
fn parse_tristate(value: &str) -> bool {
    let value = value.trim();
    value == "2" || value.eq_ignore_ascii_case("true")
}

fn parse_linker_tool(tool: Node, log: &mut ParseLog) -> LinkerSettings {
    let mut linker = LinkerSettings::default();
    let tool_name = tool.attribute("Name").unwrap_or_default();

    for attr in tool.attributes() {
        let value = attr.value();
        match attr.name() {
            "Name" => {}
            "AdditionalDependencies" => {
                linker.dependencies = value
                    .split_whitespace()
                    .map(strip_lib_extension)
                    .filter(|dep| !dep.is_empty())
                    .collect();
            }
            "AdditionalLibraryDirectories" => {
                linker.library_dirs = split_list(value, &[';', ','])
                    .iter()
                    .map(|dir| normalize_path(dir))
                    .collect();
            }
            "ModuleDefinitionFile" => linker.module_definition_file = Some(normalize_path(value)),
            "ProgramDatabaseFile" => linker.program_database = Some(normalize_path(value)),
            "LinkIncremental" => linker.incremental = parse_tristate(value),
            "OptimizeReferences" => linker.optimize_references = parse_tristate(value),
            "AdditionalOptions" => {
                linker.specific.flags = value.split_whitespace().map(str::to_string).collect();
            }
            name if IGNORED_LINKER_ATTRIBUTES.contains(&name) => {}
            name => log.unknown_attribute(PARSER, tool_name, name),
        }
    }

    linker
}

/// 过滤器节点下的文件为何整体被跳过（会向子过滤器继承）
fn filter_skip_reason(node: Node) -> Option<SkipReason> {
    let name = node.attribute("Name").unwrap_or_default();
    if is_generated_files_filter(name) {
        return Some(SkipReason::GeneratedFilesFilter);
    }
    match node.attribute("SourceControlFiles") {
        Some(value) if !parse_bool(value) => Some(SkipReason::NotSourceControlled),
        _ => None,
    }
}

fn parse_filter_contents(
    node: Node,
    tree: &mut FilterTree,
    parent: usize,
    inherited_skip: Option<SkipReason>,
    log: &mut ParseLog,
) {
    for child in node.children().filter(|n| n.is_element()) {
        match name_of(&child) {
            "Filter" => {
                let mut filter = FilterNode::new(child.attribute("Name").unwrap_or_default());
                for attr in child.attributes() {
                    match attr.name() {
                        "Name" | "UniqueIdentifier" | "ParseFiles" => {}
                        "Filter" => filter.extensions = Some(split_list(attr.value(), &[';'])),
                        "SourceControlFiles" => filter.scc_tracked = parse_bool(attr.value()),
                        name => log.unknown_attribute(PARSER, "Filter", name),
                    }
                }
                let skip = inherited_skip.or_else(|| filter_skip_reason(child));
                let index = tree.add_child(parent, filter);
                parse_filter_contents(child, tree, index, skip, log);
            }
            "File" => parse_file(child, tree, parent, inherited_skip, log),
            name => log.unknown_element(PARSER, "Filter", name),
        }
    }
}

fn parse_file(
    node: Node,
    tree: &mut FilterTree,
    filter: usize,
    inherited_skip: Option<SkipReason>,
    log: &mut ParseLog,
) {
    let path = normalize_path(node.attribute("RelativePath").unwrap_or_default());
    if path.is_empty() {
        log.unknown_element(PARSER, "Filter", "File without RelativePath");
        return;
    }

    if let Some(reason) = inherited_skip.or_else(|| classify_file(&path)) {
        log.skip(&path, reason);
        return;
    }

    let mut entry = FileEntry::new(path);
    for attr in node.attributes() {
        match attr.name() {
            name if FILE_ATTRIBUTES.contains(&name) => {}
            name => log.unknown_attribute(PARSER, "File", name),
        }
    }
    for child in node.children().filter(|n| n.is_element()) {
        match name_of(&child) {
            "FileConfiguration" => parse_file_configuration(child, &mut entry, log),
            // 嵌套的依赖文件（如 .resx）
            "File" => parse_file(child, tree, filter, inherited_skip, log),
            name => log.unknown_element(PARSER, "File", name),
        }
    }

    if entry.is_excluded() {
        info!("{} is excluded from the build", entry.path);
    }
    tree.add_file(filter, entry);
}

fn parse_file_configuration(node: Node, entry: &mut FileEntry, log: &mut ParseLog) {
    let config_name = node.attribute("Name").unwrap_or_default();

    for attr in node.attributes() {
        match attr.name() {
            "Name" => {}
            "ExcludedFromBuild" => {
                if parse_bool(attr.value()) {
                    entry.config_override = Some(FileConfigOverride {
                        excluded_from_build: true,
                    });
                }
            }
            name => log.unknown_attribute(PARSER, "FileConfiguration", name),
        }
    }

    for tool in node.children().filter(|n| n.is_element() && name_of(n) == "Tool") {
        if tool.attribute("Name") == Some(CUSTOM_BUILD_TOOL) {
            entry.custom_build = Some(format!("custom build tool in {}", config_name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CharacterSet, PchMode, TargetKind, WarningLevel};
    use crate::parser::UnknownKind;

    fn parse_str(xml: &str) -> (Vec<Project>, ParseLog) {
        let doc = Document::parse(xml).unwrap();
        let mut log = ParseLog::default();
        let projects = parse(&doc, &mut log);
        (projects, log)
    }

    #[test]
    fn test_configuration_attributes() {
        let (projects, log) = parse_str(
            r#"<VisualStudioProject Name="p">
  <Configurations>
    <Configuration Name="Release|x64" ConfigurationType="2" CharacterSet="1" UseOfMFC="2">
      <Tool Name="VCCLCompilerTool" WarningLevel="4" UsePrecompiledHeader="2"
            PrecompiledHeaderThrough="stdafx.h" RuntimeLibrary="2"
            PreprocessorDefinitions="NDEBUG;VER=3" AdditionalIncludeDirectories=".\inc,..\common" />
      <Tool Name="VCLinkerTool" AdditionalDependencies="ws2_32.lib mylib.lib" LinkIncremental="1"
            OptimizeReferences="1" />
      <Tool Name="VCPostBuildEventTool" />
    </Configuration>
  </Configurations>
</VisualStudioProject>"#,
        );
        assert!(log.unknown.is_empty());
        let config = &projects[0].configurations[0];
        assert_eq!(config.build_type, "Release");
        assert_eq!(config.platform, "x64");
        assert_eq!(config.kind, TargetKind::DynamicLibrary);
        assert_eq!(config.charset, CharacterSet::Unicode);
        assert!(!config.debug_runtime);

        let compiler = &config.compilers[0];
        assert_eq!(compiler.warning_level, WarningLevel::Level4);
        assert_eq!(compiler.pch.mode, PchMode::Use);
        assert_eq!(compiler.pch.header.as_deref(), Some("stdafx.h"));
        assert_eq!(compiler.defines.get("VER").map(String::as_str), Some("3"));
        assert_eq!(compiler.defines.get("NDEBUG").map(String::as_str), Some(""));
        assert_eq!(compiler.include_dirs[0].path, "inc");
        assert_eq!(compiler.include_dirs[1].path, "../common");

        let linker = &config.linkers[0];
        assert_eq!(linker.dependencies, vec!["ws2_32", "mylib"]);
        assert!(!linker.incremental);
        assert!(!linker.optimize_references);
    }

    #[test]
    fn test_linker_tristate() {
        assert!(!parse_tristate("0"));
        assert!(!parse_tristate("1"));
        assert!(parse_tristate("2"));
        assert!(parse_tristate("true"));
        assert!(!parse_tristate("false"));
    }

    #[test]
    fn test_unknown_constructs_are_reported_not_fatal() {
        let (projects, log) = parse_str(
            r#"<VisualStudioProject Name="p" Fancy="1">
  <Configurations>
    <Configuration Name="Debug|Win32">
      <Tool Name="VCCLCompilerTool" NewShinyOption="x" />
      <Tool Name="ThirdPartyTool" />
    </Configuration>
  </Configurations>
  <Files>
    <File RelativePath="a.cpp" SubType="Code" Foo="x" />
  </Files>
  <Mystery />
</VisualStudioProject>"#,
        );
        assert_eq!(projects.len(), 1);
        let kinds: Vec<(UnknownKind, &str)> = log.unknown.iter().map(|u| (u.kind, u.name.as_str())).collect();
        assert!(kinds.contains(&(UnknownKind::Attribute, "Fancy")));
        assert!(kinds.contains(&(UnknownKind::Attribute, "NewShinyOption")));
        assert!(kinds.contains(&(UnknownKind::Element, "Tool Name=ThirdPartyTool")));
        assert!(kinds.contains(&(UnknownKind::Element, "Mystery")));
        assert!(kinds.contains(&(UnknownKind::Attribute, "Foo")));
        assert!(!kinds.contains(&(UnknownKind::Attribute, "SubType")));
        assert!(log.unknown.iter().all(|u| u.parser == PARSER));
    }
}
