//! 输出文件回写：内容没变就不动旧文件，变了才替换并保留上一版本。
//!
//! 新内容先完整写入同目录下的临时文件，再 rename 到目标路径，
//! 中途失败不会留下写了一半的输出。

use log::{debug, info};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::ConvertError;

/// 上一版本输出的后缀
pub const BACKUP_SUFFIX: &str = ".previous";

/// 未指定权限时新文件使用的 mode
#[cfg(unix)]
const DEFAULT_MODE: u32 = 0o644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 已有文件内容相同，没有写入
    Unchanged,
    /// 写入了新内容；backup 为旧文件改名后的路径
    Written { backup: Option<PathBuf> },
}

pub fn backup_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.unwrap_or(DEFAULT_MODE)))
}

#[cfg(not(unix))]
fn apply_permissions(path: &Path, mode: Option<u32>) -> io::Result<()> {
    let Some(mode) = mode else {
        return Ok(());
    };
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, permissions)
}

fn write_error(path: &Path) -> impl FnOnce(io::Error) -> ConvertError {
    let path = path.to_path_buf();
    move |source| ConvertError::Write { path, source }
}

/// 内容有变化时才写入 output，并把旧文件保存为 `<output>.previous`
pub fn write_if_changed(
    output: &Path,
    content: &str,
    permissions: Option<u32>,
) -> Result<WriteOutcome, ConvertError> {
    let exists = match fs::read(output) {
        Ok(existing) if existing == content.as_bytes() => {
            debug!("{} is up to date", output.display());
            return Ok(WriteOutcome::Unchanged);
        }
        Ok(_) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(source) => {
            return Err(ConvertError::Read {
                path: output.to_path_buf(),
                source,
            });
        }
    };

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut scratch = NamedTempFile::new_in(dir).map_err(write_error(output))?;
    scratch
        .write_all(content.as_bytes())
        .and_then(|_| scratch.flush())
        .map_err(write_error(output))?;
    apply_permissions(scratch.path(), permissions).map_err(write_error(output))?;

    let backup = if exists {
        let backup = backup_path(output);
        fs::rename(output, &backup).map_err(write_error(&backup))?;
        debug!("Moved previous {} to {}", output.display(), backup.display());
        Some(backup)
    } else {
        None
    };

    scratch
        .persist(output)
        .map_err(|e| write_error(output)(e.error))?;
    info!("Wrote {}", output.display());
    Ok(WriteOutcome::Written { backup })
}
