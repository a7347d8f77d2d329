use vcproj2cmake::models::{CharacterSet, Dialect, FileEntry, PchMode, TargetKind, WarningLevel};
use vcproj2cmake::parser::SkipReason;
use vcproj2cmake::{parse_project_file, parse_vcproj_str, parse_vcxproj_str};

const VCPROJ_WITH_EXCLUSIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VisualStudioProject ProjectType="Visual C++" Version="9.00" Name="calc">
    <Configurations>
        <Configuration Name="Debug|Win32" ConfigurationType="1" />
    </Configurations>
    <Files>
        <Filter Name="Source Files" Filter="cpp;c;y">
            <File RelativePath=".\calc.cpp" />
            <File RelativePath=".\generated_parser.y" />
            <File RelativePath=".\lexer.cpp">
                <FileConfiguration Name="Debug|Win32">
                    <Tool Name="VCCustomBuildTool" CommandLine="flex lexer.l" />
                </FileConfiguration>
            </File>
            <File RelativePath=".\old.cpp">
                <FileConfiguration Name="Debug|Win32" ExcludedFromBuild="true" />
            </File>
        </Filter>
        <Filter Name="Vendor" SourceControlFiles="false">
            <File RelativePath="..\vendor\zip.c" />
            <Filter Name="Nested">
                <File RelativePath="..\vendor\nested.c" />
            </Filter>
        </Filter>
        <Filter Name="Generierte Dateien">
            <File RelativePath="calc_i.h" />
        </Filter>
        <File RelativePath="calc_i.c" />
        <File RelativePath="..\lib\zlib.lib" />
    </Files>
</VisualStudioProject>"#;

const VCXPROJ: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup Label="ProjectConfigurations">
    <ProjectConfiguration Include="Debug|Win32">
      <Configuration>Debug</Configuration>
      <Platform>Win32</Platform>
    </ProjectConfiguration>
    <ProjectConfiguration Include="Release|Win32">
      <Configuration>Release</Configuration>
      <Platform>Win32</Platform>
    </ProjectConfiguration>
  </ItemGroup>
  <PropertyGroup Label="Globals">
    <ProjectGuid>{6C5C3F1E-0D8B-4D2A-9E0F-5B1D3C2A7E11}</ProjectGuid>
    <RootNamespace>tool</RootNamespace>
    <Keyword>Win32Proj</Keyword>
  </PropertyGroup>
  <Import Project="$(VCTargetsPath)\Microsoft.Cpp.Default.props" />
  <PropertyGroup Condition="'$(Configuration)|$(Platform)'=='Debug|Win32'" Label="Configuration">
    <ConfigurationType>StaticLibrary</ConfigurationType>
    <UseDebugLibraries>true</UseDebugLibraries>
    <CharacterSet>MultiByte</CharacterSet>
  </PropertyGroup>
  <PropertyGroup Condition="'$(Configuration)|$(Platform)'=='Release|Win32'" Label="Configuration">
    <ConfigurationType>StaticLibrary</ConfigurationType>
    <WholeProgramOptimization>true</WholeProgramOptimization>
    <CharacterSet>MultiByte</CharacterSet>
  </PropertyGroup>
  <PropertyGroup Condition="'$(Configuration)|$(Platform)'=='Debug|Win32'">
    <LinkIncremental>true</LinkIncremental>
  </PropertyGroup>
  <ItemDefinitionGroup Condition="'$(Configuration)|$(Platform)'=='Debug|Win32'">
    <ClCompile>
      <WarningLevel>Level4</WarningLevel>
      <Optimization>Disabled</Optimization>
      <PreprocessorDefinitions>WIN32;_DEBUG;%(PreprocessorDefinitions)</PreprocessorDefinitions>
      <AdditionalIncludeDirectories>..\include;%(AdditionalIncludeDirectories)</AdditionalIncludeDirectories>
      <PrecompiledHeader>Use</PrecompiledHeader>
      <PrecompiledHeaderFile>stdafx.h</PrecompiledHeaderFile>
    </ClCompile>
    <Link>
      <AdditionalDependencies>zlib.lib;%(AdditionalDependencies)</AdditionalDependencies>
    </Link>
  </ItemDefinitionGroup>
  <ItemGroup>
    <ClCompile Include="src\a.cpp" />
    <ClCompile Include="src\b.cpp">
      <ExcludedFromBuild Condition="'$(Configuration)|$(Platform)'=='Release|Win32'">true</ExcludedFromBuild>
    </ClCompile>
    <ClInclude Include="src\a.h" />
    <None Include="grammar.y" />
  </ItemGroup>
  <Import Project="$(VCTargetsPath)\Microsoft.Cpp.targets" />
</Project>"#;

const VCXPROJ_FILTERS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <Filter Include="Source Files">
      <UniqueIdentifier>{4FC737F1-C7A5-4376-A066-2A32D752A2FF}</UniqueIdentifier>
      <Extensions>cpp;c</Extensions>
    </Filter>
    <Filter Include="Source Files\Detail" />
    <Filter Include="Header Files" />
    <Filter Include="Generated Files">
      <SourceControlFiles>false</SourceControlFiles>
    </Filter>
  </ItemGroup>
  <ItemGroup>
    <ClCompile Include="src\a.cpp">
      <Filter>Source Files</Filter>
    </ClCompile>
    <ClCompile Include="src\b.cpp">
      <Filter>Source Files\Detail</Filter>
    </ClCompile>
    <ClCompile Include="gen\parser_tab.cpp">
      <Filter>Generated Files</Filter>
    </ClCompile>
  </ItemGroup>
  <ItemGroup>
    <ClInclude Include="src\a.h">
      <Filter>Header Files</Filter>
    </ClInclude>
  </ItemGroup>
</Project>"#;

fn file_paths(files: &[FileEntry]) -> Vec<&str> {
    files.iter().map(|f| f.path.as_str()).collect()
}

#[test]
fn test_vcproj_file_exclusions() {
    let outcome = parse_vcproj_str(VCPROJ_WITH_EXCLUSIONS).unwrap();
    let project = &outcome.projects[0];
    assert_eq!(project.name, "calc");
    assert_eq!(project.dialect, Some(Dialect::Vcproj));

    let all: Vec<&str> = project.filters.files().map(|f| f.path.as_str()).collect();
    assert_eq!(all, vec!["calc.cpp", "lexer.cpp", "old.cpp"]);

    let units: Vec<&str> = project
        .filters
        .files()
        .filter(|f| f.is_build_unit())
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(units, vec!["calc.cpp"]);
    assert!(project.has_build_units);

    let skipped: Vec<(&str, SkipReason)> = outcome
        .log
        .skipped
        .iter()
        .map(|s| (s.path.as_str(), s.reason))
        .collect();
    assert!(skipped.contains(&("generated_parser.y", SkipReason::JunkExtension)));
    assert!(skipped.contains(&("../vendor/zip.c", SkipReason::NotSourceControlled)));
    assert!(skipped.contains(&("../vendor/nested.c", SkipReason::NotSourceControlled)));
    assert!(skipped.contains(&("calc_i.h", SkipReason::GeneratedFilesFilter)));
    assert!(skipped.contains(&("calc_i.c", SkipReason::IdlGenerated)));
    assert!(skipped.contains(&("../lib/zlib.lib", SkipReason::LibrarySource)));
}

#[test]
fn test_vcxproj_configurations() {
    let outcome = parse_vcxproj_str(VCXPROJ, Some(VCXPROJ_FILTERS), "fallback").unwrap();
    assert_eq!(outcome.projects.len(), 1);
    let project = &outcome.projects[0];

    assert_eq!(project.name, "tool");
    assert_eq!(project.dialect, Some(Dialect::Vcxproj));
    assert_eq!(project.keyword.as_deref(), Some("Win32Proj"));
    assert_eq!(project.configurations.len(), 2);

    let debug = &project.configurations[0];
    assert_eq!(debug.full_name(), "Debug|Win32");
    assert_eq!(debug.kind, TargetKind::StaticLibrary);
    assert_eq!(debug.charset, CharacterSet::Mbcs);
    assert!(debug.debug_runtime);

    let compiler = &debug.compilers[0];
    assert_eq!(compiler.warning_level, WarningLevel::Level4);
    assert_eq!(
        compiler.defines.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["WIN32", "_DEBUG"]
    );
    assert_eq!(compiler.include_dirs.len(), 1);
    assert_eq!(compiler.include_dirs[0].path, "../include");
    assert_eq!(compiler.pch.mode, PchMode::Use);
    assert_eq!(compiler.pch.header.as_deref(), Some("stdafx.h"));

    let linker = &debug.linkers[0];
    assert_eq!(linker.dependencies, vec!["zlib"]);
    assert!(linker.incremental);

    let release = &project.configurations[1];
    assert_eq!(release.kind, TargetKind::StaticLibrary);
    assert!(release.whole_program_optimization);
    assert!(!release.debug_runtime);
    assert!(release.compilers.is_empty());
}

#[test]
fn test_vcxproj_companion_builds_filter_tree() {
    let outcome = parse_vcxproj_str(VCXPROJ, Some(VCXPROJ_FILTERS), "fallback").unwrap();
    let project = &outcome.projects[0];
    let tree = &project.filters;

    let src = tree.find("Source Files").unwrap();
    assert_eq!(file_paths(&tree.node(src).files), vec!["src/a.cpp"]);
    assert_eq!(
        tree.node(src).extensions,
        Some(vec!["cpp".to_string(), "c".to_string()])
    );

    let detail = tree.find("Source Files\\Detail").unwrap();
    assert_eq!(file_paths(&tree.node(detail).files), vec!["src/b.cpp"]);

    let headers = tree.find("Header Files").unwrap();
    assert_eq!(file_paths(&tree.node(headers).files), vec!["src/a.h"]);

    let generated = tree.find("Generated Files").unwrap();
    assert!(tree.node(generated).files.is_empty());

    let skipped: Vec<&str> = outcome.log.skipped.iter().map(|s| s.path.as_str()).collect();
    assert!(skipped.contains(&"gen/parser_tab.cpp"));
    assert!(skipped.contains(&"grammar.y"));
}

#[test]
fn test_vcxproj_companion_overrides_item_payload() {
    // 工程文件中 b.cpp 被排除，伴随文件重新声明 b.cpp 且不带该属性：以伴随文件为准
    let outcome = parse_vcxproj_str(VCXPROJ, Some(VCXPROJ_FILTERS), "fallback").unwrap();
    let b = outcome.projects[0]
        .filters
        .files()
        .find(|f| f.path == "src/b.cpp")
        .unwrap();
    assert!(!b.is_excluded());
    assert!(b.is_build_unit());

    // 没有伴随文件时保持工程文件中的设置
    let outcome = parse_vcxproj_str(VCXPROJ, None, "fallback").unwrap();
    let b = outcome.projects[0]
        .filters
        .files()
        .find(|f| f.path == "src/b.cpp")
        .unwrap();
    assert!(b.is_excluded());
}

#[test]
fn test_vcxproj_companion_can_add_exclusion() {
    let primary = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup Label="ProjectConfigurations">
    <ProjectConfiguration Include="Debug|x64">
      <Configuration>Debug</Configuration>
      <Platform>x64</Platform>
    </ProjectConfiguration>
  </ItemGroup>
  <ItemGroup>
    <ClCompile Include="main.cpp" />
  </ItemGroup>
</Project>"#;
    let filters = r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <ClCompile Include="MAIN.CPP">
      <ExcludedFromBuild>true</ExcludedFromBuild>
    </ClCompile>
  </ItemGroup>
</Project>"#;

    let outcome = parse_vcxproj_str(primary, Some(filters), "app").unwrap();
    let project = &outcome.projects[0];
    assert_eq!(project.name, "app");
    assert_eq!(project.filters.files().count(), 1);
    assert!(project.filters.files().all(FileEntry::is_excluded));
    assert!(!project.has_build_units);
}

#[test]
fn test_dialects_agree_on_enum_values() {
    let old = parse_vcproj_str(
        r#"<VisualStudioProject Name="lib">
  <Configurations>
    <Configuration Name="Debug|Win32" ConfigurationType="4" CharacterSet="2">
      <Tool Name="VCCLCompilerTool" WarningLevel="4" UsePrecompiledHeader="2" />
    </Configuration>
  </Configurations>
</VisualStudioProject>"#,
    )
    .unwrap();
    let new = parse_vcxproj_str(VCXPROJ, None, "lib").unwrap();

    let a = &old.projects[0].configurations[0];
    let b = &new.projects[0].configurations[0];
    assert_eq!(a.kind, b.kind);
    assert_eq!(a.charset, b.charset);
    assert_eq!(a.compilers[0].warning_level, b.compilers[0].warning_level);
    assert_eq!(a.compilers[0].pch.mode, b.compilers[0].pch.mode);
}

#[test]
fn test_parse_project_file_reads_companion() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("tool.vcxproj");
    std::fs::write(&path, VCXPROJ).unwrap();
    std::fs::write(dir.path().join("tool.vcxproj.filters"), VCXPROJ_FILTERS).unwrap();

    let outcome = parse_project_file(&path).unwrap();
    let tree = &outcome.projects[0].filters;
    assert!(tree.find("Source Files\\Detail").is_some());
}

#[test]
fn test_malformed_xml_is_an_error() {
    assert!(parse_vcproj_str("<VisualStudioProject Name=\"x\">").is_err());

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("broken.vcproj");
    std::fs::write(&path, "<VisualStudioProject").unwrap();
    let err = parse_project_file(&path).unwrap_err();
    assert!(matches!(err, vcproj2cmake::ConvertError::Xml { .. }));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("project.cbp");
    std::fs::write(&path, "<CodeBlocks_project_file/>").unwrap();
    let err = parse_project_file(&path).unwrap_err();
    assert!(matches!(err, vcproj2cmake::ConvertError::UnsupportedProjectType(_)));
}
