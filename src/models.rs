use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// 工程文件方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dialect {
    /// 属性风格的旧格式 (.vcproj)
    Vcproj,
    /// 元素风格的新格式 (.vcxproj + .vcxproj.filters)
    Vcxproj,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TargetKind {
    #[default]
    Unknown,
    Application,
    DynamicLibrary,
    StaticLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LibraryUsage {
    #[default]
    None,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CharacterSet {
    #[default]
    Sbcs,
    Unicode,
    Mbcs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExceptionHandling {
    Disabled,
    #[default]
    Sync,
    Async,
    SyncCThrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Optimization {
    #[default]
    Disabled,
    MinSpace,
    MaxSpeed,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WarningLevel {
    Off,
    Level1,
    Level2,
    #[default]
    Level3,
    Level4,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PchMode {
    #[default]
    NotUsing,
    Create,
    Use,
}

/// 运行时库（只关心是否为调试版本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuntimeLibrary {
    MultiThreaded,
    MultiThreadedDebug,
    MultiThreadedDll,
    MultiThreadedDebugDll,
}

impl RuntimeLibrary {
    pub fn is_debug(self) -> bool {
        matches!(
            self,
            RuntimeLibrary::MultiThreadedDebug | RuntimeLibrary::MultiThreadedDebugDll
        )
    }
}

/// 工具链家族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ToolFamily {
    #[default]
    Msvc,
}

/// 只有特定工具链才理解的设置
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolSpecific {
    pub family: ToolFamily,
    pub flags: Vec<String>,
    pub disabled_warnings: Vec<String>,
}

/// 头文件搜索目录。before/after/system 位置标记会被解析保存，但生成阶段尚未区分处理。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncludeDir {
    pub path: String,
    pub before: bool,
    pub after: bool,
    pub system: bool,
}

impl IncludeDir {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrecompiledHeader {
    pub mode: PchMode,
    pub header: Option<String>,
    pub binary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilerSettings {
    pub include_dirs: Vec<IncludeDir>,
    /// 宏定义，值可以为空
    pub defines: BTreeMap<String, String>,
    pub rtti: bool,
    pub exception_handling: ExceptionHandling,
    pub optimization: Optimization,
    pub warning_level: WarningLevel,
    pub warnings_as_errors: bool,
    pub pch: PrecompiledHeader,
    pub specific: ToolSpecific,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            defines: BTreeMap::new(),
            rtti: true,
            exception_handling: ExceptionHandling::default(),
            optimization: Optimization::default(),
            warning_level: WarningLevel::default(),
            warnings_as_errors: false,
            pch: PrecompiledHeader::default(),
            specific: ToolSpecific::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkerSettings {
    /// 依赖库名（已去掉 .lib）
    pub dependencies: Vec<String>,
    pub library_dirs: Vec<String>,
    pub module_definition_file: Option<String>,
    pub program_database: Option<String>,
    pub incremental: bool,
    pub optimize_references: bool,
    pub specific: ToolSpecific,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Configuration {
    /// 构建类型标签，可含空格
    pub build_type: String,
    pub platform: String,
    pub kind: TargetKind,
    pub use_mfc: LibraryUsage,
    pub use_atl: LibraryUsage,
    pub charset: CharacterSet,
    pub whole_program_optimization: bool,
    pub debug_runtime: bool,
    pub compilers: Vec<CompilerSettings>,
    pub linkers: Vec<LinkerSettings>,
}

impl Configuration {
    pub fn new(build_type: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            build_type: build_type.into(),
            platform: platform.into(),
            ..Default::default()
        }
    }

    /// 旧格式用 `Build|Platform` 组合字符串标识配置
    pub fn from_combined_name(name: &str) -> Self {
        match name.split_once('|') {
            Some((build_type, platform)) => Self::new(build_type.trim(), platform.trim()),
            None => Self::new(name.trim(), ""),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}|{}", self.build_type, self.platform)
    }

    pub fn matches(&self, build_type: &str, platform: &str) -> bool {
        self.build_type == build_type && self.platform == platform
    }
}

/// 单个文件的配置覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileConfigOverride {
    pub excluded_from_build: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub config_override: Option<FileConfigOverride>,
    /// 挂接了自定义构建工具时的排除原因
    pub custom_build: Option<String>,
}

const COMPILABLE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++"];
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "inl", "tlh", "tli"];

impl FileEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn is_header(&self) -> bool {
        self.extension()
            .is_some_and(|ext| HEADER_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn is_excluded(&self) -> bool {
        self.custom_build.is_some()
            || self
                .config_override
                .as_ref()
                .is_some_and(|o| o.excluded_from_build)
    }

    /// 参与编译的非头文件源文件
    pub fn is_build_unit(&self) -> bool {
        !self.is_excluded()
            && self
                .extension()
                .is_some_and(|ext| COMPILABLE_EXTENSIONS.contains(&ext.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterNode {
    pub name: String,
    pub extensions: Option<Vec<String>>,
    pub scc_tracked: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub files: Vec<FileEntry>,
}

impl FilterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scc_tracked: true,
            ..Default::default()
        }
    }
}

/// 过滤器树：节点存放在 arena 中，0 号节点是无名根节点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTree {
    nodes: Vec<FilterNode>,
    #[serde(skip)]
    by_path: HashMap<String, usize>,
}

impl Default for FilterTree {
    fn default() -> Self {
        Self {
            nodes: vec![FilterNode::new("")],
            by_path: HashMap::new(),
        }
    }
}

impl FilterTree {
    pub const ROOT: usize = 0;

    pub fn root(&self) -> &FilterNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> &FilterNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut FilterNode {
        &mut self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].files.is_empty()
    }

    /// 在 parent 下挂接子节点，返回新节点下标
    pub fn add_child(&mut self, parent: usize, mut node: FilterNode) -> usize {
        let index = self.nodes.len();
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    pub fn add_file(&mut self, node: usize, file: FileEntry) {
        self.nodes[node].files.push(file);
    }

    /// 从根到该节点的名称路径，以反斜杠连接（如 `Source Files\Sub`）
    pub fn path_of(&self, index: usize) -> String {
        let mut names = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            if i == Self::ROOT {
                break;
            }
            names.push(self.nodes[i].name.as_str());
            current = self.nodes[i].parent;
        }
        names.reverse();
        names.join("\\")
    }

    /// 树构建完成后建立一次 路径 -> 下标 索引
    pub fn build_index(&mut self) {
        let by_path = (1..self.nodes.len())
            .map(|i| (self.path_of(i), i))
            .collect();
        self.by_path = by_path;
    }

    pub fn find(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// 深度优先遍历（先父后子），跳过根
    pub fn walk(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.nodes[Self::ROOT].children.iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        order
    }

    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.nodes.iter().flat_map(|n| n.files.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceControlInfo {
    pub project_name: Option<String>,
    pub local_path: Option<String>,
    pub provider: Option<String>,
    pub aux_path: Option<String>,
}

impl SourceControlInfo {
    /// 没有工程名时其余字段一律不输出
    pub fn is_present(&self) -> bool {
        self.project_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Project {
    pub name: String,
    pub dialect: Option<Dialect>,
    pub guid: Option<String>,
    pub root_namespace: Option<String>,
    pub keyword: Option<String>,
    pub scc: SourceControlInfo,
    pub configurations: Vec<Configuration>,
    pub filters: FilterTree,
    pub has_build_units: bool,
}

impl Project {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            ..Default::default()
        }
    }

    /// 根据文件树重新计算 has_build_units
    pub fn update_build_units(&mut self) {
        self.has_build_units = self.filters.files().any(FileEntry::is_build_unit);
    }

    pub fn platforms(&self) -> Vec<&str> {
        let mut platforms: Vec<&str> = Vec::new();
        for config in &self.configurations {
            if !platforms.contains(&config.platform.as_str()) {
                platforms.push(&config.platform);
            }
        }
        platforms
    }

    /// 选出权威配置：构建类型与给定名称相同（忽略大小写），否则取第一个
    pub fn authoritative_configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations
            .iter()
            .find(|c| c.build_type.eq_ignore_ascii_case(name))
            .or_else(|| self.configurations.first())
    }
}
