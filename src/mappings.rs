//! 映射表：把原始标记（库名、宏定义、头文件目录）按平台替换成目标脚本中的标记。
//!
//! 表项格式为 `key:platform1[=replacement1]|platform2[=replacement2]`。
//! 平台段没有替换值时沿用原标记；平台名为空表示适用于所有平台；
//! 替换值为空（`WIN32=`）表示在该平台上去掉这个标记。
//!
//! 查找顺序：先精确匹配键，再按顺序找第一个能作为正则完整匹配标记的键。
//! 工程本地表在前、根目录表在后拼接，键冲突时迭代中第一个出现的表项生效，
//! 所以本地表优先。

use log::{debug, trace};
use regex::Regex;
use std::path::Path;

use crate::utils::{MappingLine, parse_mapping_line};

/// 不区分平台的合成桶名
pub const ALL_PLATFORMS: &str = "ALL";

pub const INCLUDE_MAPPINGS_FILE: &str = "include_mappings.txt";
pub const DEPENDENCY_MAPPINGS_FILE: &str = "dependency_mappings.txt";
pub const LIBRARY_DIRECTORY_MAPPINGS_FILE: &str = "library_directory_mappings.txt";
pub const DEFINE_MAPPINGS_FILE: &str = "define_mappings.txt";

#[derive(Debug, Clone)]
struct MappingEntry {
    key: String,
    pattern: Option<Regex>,
    platforms: Vec<(String, Option<String>)>,
}

impl MappingEntry {
    fn from_line(line: MappingLine) -> Self {
        let pattern = match Regex::new(&format!("^(?:{})$", line.key)) {
            Ok(re) => Some(re),
            Err(e) => {
                debug!("Mapping key '{}' is not a usable pattern: {}", line.key, e);
                None
            }
        };
        Self {
            key: line.key,
            pattern,
            platforms: line.platforms,
        }
    }
}

/// 按平台分桶的标记列表，保持插入顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformTokens {
    buckets: Vec<(String, Vec<String>)>,
}

impl PlatformTokens {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket_mut(&mut self, platform: &str) -> &mut Vec<String> {
        let index = match self.buckets.iter().position(|(p, _)| p == platform) {
            Some(index) => index,
            None => {
                self.buckets.push((platform.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }

    pub fn push(&mut self, platform: &str, token: impl Into<String>) {
        let token = token.into();
        let bucket = self.bucket_mut(platform);
        if !bucket.contains(&token) {
            bucket.push(token);
        }
    }

    pub fn get(&self, platform: &str) -> Option<&[String]> {
        self.buckets
            .iter()
            .find(|(p, _)| p == platform)
            .map(|(_, tokens)| tokens.as_slice())
    }

    /// "ALL" 桶排在最前，其余按首次出现顺序
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        let all = self
            .buckets
            .iter()
            .filter(|(p, _)| p == ALL_PLATFORMS);
        let rest = self
            .buckets
            .iter()
            .filter(|(p, _)| p != ALL_PLATFORMS);
        all.chain(rest)
            .filter(|(_, tokens)| !tokens.is_empty())
            .map(|(p, tokens)| (p.as_str(), tokens.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|(_, tokens)| tokens.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(parse_mapping_line)
            .map(MappingEntry::from_line)
            .collect();
        Self { entries }
    }

    /// 读取映射文件；文件不存在视为空表
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let table = Self::parse(&content);
                debug!("Loaded {} mappings from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                trace!("No mapping file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// 先读工程本地目录，再读根目录，直接拼接
    pub fn load(local_dir: &Path, root_dir: &Path, file_name: &str) -> Self {
        let mut table = Self::from_file(&local_dir.join(file_name));
        if local_dir != root_dir {
            table.append(Self::from_file(&root_dir.join(file_name)));
        }
        table
    }

    pub fn append(&mut self, other: MappingTable) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, token: &str) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.key == token).or_else(|| {
            self.entries
                .iter()
                .find(|e| e.pattern.as_ref().is_some_and(|re| re.is_match(token)))
        })
    }

    pub fn resolve(&self, token: &str) -> PlatformTokens {
        let mut result = PlatformTokens::new();
        self.resolve_into(token, &mut result);
        result
    }

    /// 解析一个标记并累加进已有的分桶结果
    pub fn resolve_into(&self, token: &str, result: &mut PlatformTokens) {
        let Some(entry) = self.lookup(token) else {
            result.push(ALL_PLATFORMS, token);
            return;
        };
        trace!("Token '{}' mapped by entry '{}'", token, entry.key);
        for (platform, replacement) in &entry.platforms {
            let platform = if platform.is_empty() {
                ALL_PLATFORMS
            } else {
                platform.as_str()
            };
            match replacement {
                None => result.push(platform, token),
                Some(value) if value.is_empty() => {}
                Some(value) => result.push(platform, value.as_str()),
            }
        }
    }
}

/// 一次转换所用的四张映射表
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    pub include_dirs: MappingTable,
    pub dependencies: MappingTable,
    pub library_dirs: MappingTable,
    pub defines: MappingTable,
}

impl Mappings {
    pub fn load(local_dir: &Path, root_dir: &Path) -> Self {
        Self {
            include_dirs: MappingTable::load(local_dir, root_dir, INCLUDE_MAPPINGS_FILE),
            dependencies: MappingTable::load(local_dir, root_dir, DEPENDENCY_MAPPINGS_FILE),
            library_dirs: MappingTable::load(
                local_dir,
                root_dir,
                LIBRARY_DIRECTORY_MAPPINGS_FILE,
            ),
            defines: MappingTable::load(local_dir, root_dir, DEFINE_MAPPINGS_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_mapped_token() {
        let table = MappingTable::parse("foo:WIN32=bar|LINUX");
        let result = table.resolve("foo");
        assert_eq!(result.get("WIN32"), Some(&["bar".to_string()][..]));
        assert_eq!(result.get("LINUX"), Some(&["foo".to_string()][..]));
        assert_eq!(result.get(ALL_PLATFORMS), None);
    }

    #[test]
    fn test_resolve_unmapped_token() {
        let table = MappingTable::parse("foo:WIN32=bar|LINUX");
        let result = table.resolve("baz");
        assert_eq!(result.get(ALL_PLATFORMS), Some(&["baz".to_string()][..]));
        assert_eq!(result.iter().count(), 1);
    }

    #[test]
    fn test_empty_platform_means_all() {
        let table = MappingTable::parse("odbc32:=odbc");
        let result = table.resolve("odbc32");
        assert_eq!(result.get(ALL_PLATFORMS), Some(&["odbc".to_string()][..]));
    }

    #[test]
    fn test_empty_replacement_drops_token() {
        let table = MappingTable::parse("WIN32:WIN32|UNIX=");
        let result = table.resolve("WIN32");
        assert_eq!(result.get("WIN32"), Some(&["WIN32".to_string()][..]));
        assert_eq!(result.get("UNIX"), None);
    }

    #[test]
    fn test_regex_fallback() {
        let table = MappingTable::parse("# comment\nboost_.*:UNIX=boost\nexact:=x");
        let result = table.resolve("boost_system-vc90");
        assert_eq!(result.get("UNIX"), Some(&["boost".to_string()][..]));

        // 正则必须完整匹配
        let result = table.resolve("libboost_x");
        assert_eq!(result.get(ALL_PLATFORMS), Some(&["libboost_x".to_string()][..]));
    }

    #[test]
    fn test_exact_match_beats_earlier_pattern() {
        let table = MappingTable::parse("ws2_.*:=sockets\nws2_32:WIN32");
        let result = table.resolve("ws2_32");
        assert_eq!(result.get("WIN32"), Some(&["ws2_32".to_string()][..]));
        assert_eq!(result.get(ALL_PLATFORMS), None);
    }

    #[test]
    fn test_first_occurrence_wins_on_key_collision() {
        let mut local = MappingTable::parse("foo:WIN32=local");
        let root = MappingTable::parse("foo:WIN32=root|UNIX");
        local.append(root);
        assert_eq!(local.len(), 2);

        let result = local.resolve("foo");
        assert_eq!(result.get("WIN32"), Some(&["local".to_string()][..]));
        assert_eq!(result.get("UNIX"), None);
    }

    #[test]
    fn test_accumulate_and_deduplicate() {
        let table = MappingTable::parse("a:UNIX=m\nb:UNIX=m|WIN32");
        let mut result = PlatformTokens::new();
        for token in ["a", "b", "c", "c"] {
            table.resolve_into(token, &mut result);
        }
        assert_eq!(result.get("UNIX"), Some(&["m".to_string()][..]));
        assert_eq!(result.get("WIN32"), Some(&["b".to_string()][..]));
        assert_eq!(result.get(ALL_PLATFORMS), Some(&["c".to_string()][..]));

        let order: Vec<&str> = result.iter().map(|(p, _)| p).collect();
        assert_eq!(order, vec![ALL_PLATFORMS, "UNIX", "WIN32"]);
    }

    #[test]
    fn test_load_local_then_root() {
        let local = tempfile::TempDir::new().unwrap();
        let root = tempfile::TempDir::new().unwrap();
        std::fs::write(local.path().join(DEFINE_MAPPINGS_FILE), "X:=LOCAL_X\n").unwrap();
        std::fs::write(
            root.path().join(DEFINE_MAPPINGS_FILE),
            "X:=ROOT_X\nY:UNIX\n",
        )
        .unwrap();

        let mappings = Mappings::load(local.path(), root.path());
        assert_eq!(mappings.defines.len(), 3);
        assert!(mappings.include_dirs.is_empty());
        assert_eq!(
            mappings.defines.resolve("X").get(ALL_PLATFORMS),
            Some(&["LOCAL_X".to_string()][..])
        );
        assert_eq!(
            mappings.defines.resolve("Y").get("UNIX"),
            Some(&["Y".to_string()][..])
        );
    }
}
