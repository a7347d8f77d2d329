use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// 转换设置。作为显式参数传给每个阶段，不使用全局状态。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// CMake 无法按配置区分的设置取自哪个配置
    pub authoritative_config: String,
    /// 校验失败时是否中止整个运行（否则记录并跳过该工程）
    pub strict_validation: bool,
    /// 是否要求工程至少包含一个文件（默认关闭，新格式文件列表支持尚不完整）
    pub require_files: bool,
    /// 输出文件权限（八进制 mode，例如 0o644）
    pub file_permissions: Option<u32>,
    pub emit_timestamp: bool,
    pub emit_origin: bool,
    /// 映射表所在的子目录（相对于工程目录和根目录）
    pub mapping_dir_name: String,
    /// 源码树根目录，None 表示当前目录
    pub root_dir: Option<PathBuf>,
    pub min_cmake_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authoritative_config: "Debug".to_string(),
            strict_validation: false,
            require_files: false,
            file_permissions: None,
            emit_timestamp: false,
            emit_origin: true,
            mapping_dir_name: "cmake/vcproj2cmake".to_string(),
            root_dir: None,
            min_cmake_version: "2.8.12".to_string(),
        }
    }
}

impl Settings {
    /// 从 JSON 设置文件读取，缺省字段取默认值
    pub fn from_json_file(path: &Path) -> Result<Self, ConvertError> {
        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConvertError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConvertError::Settings {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn root_dir(&self) -> PathBuf {
        self.root_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// 工程本地映射目录
    pub fn local_mapping_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.mapping_dir_name)
    }

    /// 根目录映射目录
    pub fn root_mapping_dir(&self) -> PathBuf {
        self.root_dir().join(&self.mapping_dir_name)
    }
}
