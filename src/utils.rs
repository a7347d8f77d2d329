use std::path::{Component, Path, PathBuf};

/// 映射文件中的一行：`key:platform[=value]|platform[=value]...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingLine {
    pub key: String,
    /// (平台名, 替换值)。平台名为空表示适用于所有平台
    pub platforms: Vec<(String, Option<String>)>,
}

/// 反斜杠转正斜杠，并去掉开头的 `./`
pub fn normalize_path(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    strip_dot_slash(&slashed).to_string()
}

/// 去掉（可能重复出现的）开头 `./`
pub fn strip_dot_slash(path: &str) -> &str {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest
}

/// 按分隔符拆分 IDE 列表值，去掉空项和包裹的引号
pub fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(|c| separators.contains(&c))
        .map(|item| item.trim().trim_matches('"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// 链接依赖去掉 `.lib` 扩展名
pub fn strip_lib_extension(name: &str) -> String {
    let name = name.trim().trim_matches('"');
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".lib") {
        name[..len - 4].to_string()
    } else {
        name.to_string()
    }
}

/// 配置名 -> CMake 属性后缀：大写，空白串替换为单个下划线
pub fn config_identifier(build_type: &str) -> String {
    build_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// 任意名称 -> CMake 变量名片段（非字母数字字符换成下划线）
pub fn cmake_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// 解析映射文件的一行。注释行（`#` 开头）和空行返回 None。
///
/// 键和值之间以第一个冒号分隔，但 `C:/` 或 `C:\` 这样的盘符冒号不算分隔符。
pub fn parse_mapping_line(line: &str) -> Option<MappingLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let split_at = find_key_separator(line)?;
    let key = line[..split_at].trim();
    if key.is_empty() {
        return None;
    }
    let rest = &line[split_at + 1..];

    let platforms = rest
        .split('|')
        .map(|segment| {
            let segment = segment.trim();
            match segment.split_once('=') {
                Some((platform, value)) => {
                    (platform.trim().to_string(), Some(value.trim().to_string()))
                }
                None => (segment.to_string(), None),
            }
        })
        .collect();

    Some(MappingLine {
        key: key.to_string(),
        platforms,
    })
}

fn find_key_separator(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    line.char_indices()
        .filter(|&(_, c)| c == ':')
        .map(|(i, _)| i)
        .find(|&i| {
            let drive_letter = i == 1
                && bytes[0].is_ascii_alphabetic()
                && matches!(bytes.get(2), Some(b'/') | Some(b'\\'));
            !drive_letter
        })
}

/// 计算 target 相对于 base 的路径（纯逻辑计算，不访问文件系统）
pub fn relative_path(target: &Path, base: &Path) -> Option<PathBuf> {
    if target.has_root() != base.has_root() {
        return None;
    }
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && (target.first().is_some_and(|c| matches!(c, Component::Prefix(_) | Component::RootDir))) {
        return None;
    }

    let mut result = PathBuf::new();
    for component in &base[common..] {
        if matches!(component, Component::Normal(_)) {
            result.push("..");
        }
    }
    for component in &target[common..] {
        result.push(component.as_os_str());
    }
    Some(result)
}
