use std::path::PathBuf;

use thiserror::Error;

/// 单个工程转换过程中的致命错误
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed XML in {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("unsupported project file type: {}", .0.display())]
    UnsupportedProjectType(PathBuf),

    #[error("no project element found in {}", .0.display())]
    NoProject(PathBuf),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 工程校验失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("project '{project}' failed validation: {reason}")]
pub struct ValidationError {
    pub project: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(project: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            reason: reason.into(),
        }
    }
}
