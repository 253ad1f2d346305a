// Rewind - 目录树复制模块
// 负责递归复制（保留时间戳和权限）、尽力删除以及文件计数

use crate::error::{Result, RewindError};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// 将 walkdir 错误转换为引擎错误
fn walk_error(root: &Path, err: walkdir::Error) -> RewindError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let context = format!("Failed to walk {:?}", path);
    RewindError::from_io(path, context, io::Error::from(err))
}

/// 递归复制 `src` 到 `dst`
///
/// `dst` 必须不存在（其父目录会按需创建）。每复制一个非目录条目调用一次 `on_file`。
/// 条目按文件名顺序处理。任何一个文件复制失败都会立即中止并返回错误，
/// 已写入的部分保留在磁盘上。普通文件、目录和符号链接之外的特殊文件
/// （命名管道、套接字、设备）直接返回 `InvalidInput` 错误。
///
/// # 参数
/// * `src` - 源目录
/// * `dst` - 目标目录
/// * `on_file` - 每复制完一个文件后的回调，参数为相对路径
///
/// # 返回
/// * `Ok(u64)` - 复制的文件数量
/// * `Err(RewindError)` - 第一个失败的条目对应的错误
pub fn copy_tree(src: &Path, dst: &Path, mut on_file: impl FnMut(&Path)) -> Result<u64> {
    if fs::symlink_metadata(dst).is_ok() {
        return Err(RewindError::AlreadyExists(dst.to_path_buf()));
    }
    fs::create_dir_all(dst)
        .map_err(|e| RewindError::from_io(dst, format!("Failed to create {:?}", dst), e))?;

    let mut copied = 0u64;
    let mut dirs: Vec<(PathBuf, PathBuf)> = Vec::new();

    for entry in WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| RewindError::Io {
                context: format!("Entry {:?} escaped {:?}", entry.path(), src),
                source: io::Error::from(io::ErrorKind::InvalidData),
            })?
            .to_path_buf();
        let target = dst.join(&rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                RewindError::from_io(&target, format!("Failed to create dir {:?}", target), e)
            })?;
            dirs.push((entry.path().to_path_buf(), target));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
            on_file(&rel);
        } else if file_type.is_file() {
            copy_file_preserving(entry.path(), &target)?;
            copied += 1;
            on_file(&rel);
        } else {
            // 管道、套接字和设备文件打开后可能永远阻塞，不做复制
            return Err(RewindError::Io {
                context: format!("Unsupported special file {:?}", entry.path()),
                source: io::Error::from(io::ErrorKind::InvalidInput),
            });
        }
    }

    // 子目录时间戳在内容写完后再设置，否则会被写入操作覆盖
    for (src_dir, dst_dir) in dirs.iter().rev() {
        if let Ok(meta) = fs::metadata(src_dir) {
            let mtime = FileTime::from_last_modification_time(&meta);
            let atime = FileTime::from_last_access_time(&meta);
            if let Err(e) = filetime::set_file_times(dst_dir, atime, mtime) {
                debug!(dir = %dst_dir.display(), error = %e, "Could not preserve directory times");
            }
        }
    }

    Ok(copied)
}

/// 复制单个文件，并保留修改时间、访问时间和权限
///
/// # 返回
/// * `Ok(u64)` - 复制的字节数
pub fn copy_file_preserving(src: &Path, dst: &Path) -> Result<u64> {
    let copy_err = |e: io::Error| {
        RewindError::from_io(src, format!("Failed to copy {:?} to {:?}", src, dst), e)
    };

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    // fs::copy 会同时复制权限位
    let bytes = fs::copy(src, dst).map_err(copy_err)?;

    let src_meta = fs::metadata(src).map_err(copy_err)?;
    let mtime = FileTime::from_last_modification_time(&src_meta);
    let atime = FileTime::from_last_access_time(&src_meta);

    let mut perms = fs::metadata(dst).map_err(copy_err)?.permissions();
    let original_readonly = perms.readonly();

    // 只读文件需要先取消只读才能设置时间戳
    if original_readonly {
        perms.set_readonly(false);
        fs::set_permissions(dst, perms.clone()).map_err(copy_err)?;
    }

    filetime::set_file_times(dst, atime, mtime).map_err(copy_err)?;

    if original_readonly {
        perms.set_readonly(true);
        fs::set_permissions(dst, perms).map_err(copy_err)?;
    }

    Ok(bytes)
}

/// 重新创建符号链接（不跟随链接复制目标内容）
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link_err = |e: io::Error| {
        RewindError::from_io(src, format!("Failed to symlink {:?} -> {:?}", dst, src), e)
    };
    let target = fs::read_link(src).map_err(link_err)?;

    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, dst).map_err(link_err)?;

    #[cfg(windows)]
    {
        let is_dir = fs::metadata(src).map(|m| m.is_dir()).unwrap_or(false);
        if is_dir {
            std::os::windows::fs::symlink_dir(&target, dst).map_err(link_err)?;
        } else {
            std::os::windows::fs::symlink_file(&target, dst).map_err(link_err)?;
        }
    }

    Ok(())
}

/// 尽力删除整个目录树
///
/// 单个子条目删除失败只记录警告并继续；根目录本身删除失败则返回错误。
/// 目标不存在时直接成功。
///
/// # 返回
/// * `Ok(usize)` - 删除失败而被跳过的子条目数量
/// * `Err(RewindError)` - 根目录无法删除
pub fn remove_tree_best_effort(root: &Path) -> Result<usize> {
    remove_tree_with(root, |path, is_dir| {
        if is_dir {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    })
}

/// 与 [`remove_tree_best_effort`] 相同，但子条目通过 `remove_entry` 删除
///
/// `remove_entry` 的第二个参数表示该条目是否为目录。根目录始终用
/// `fs::remove_dir` 删除，因此有子条目残留时根目录删除必然失败。
pub fn remove_tree_with(
    root: &Path,
    mut remove_entry: impl FnMut(&Path, bool) -> io::Result<()>,
) -> Result<usize> {
    let meta = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(RewindError::from_io(root, format!("Failed to stat {:?}", root), e)),
    };

    if !meta.is_dir() {
        fs::remove_file(root)
            .map_err(|e| RewindError::from_io(root, format!("Failed to remove {:?}", root), e))?;
        return Ok(0);
    }

    let mut skipped = 0usize;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Cannot access entry during cleanup");
                skipped += 1;
                continue;
            }
        };
        if let Err(e) = remove_entry(entry.path(), entry.file_type().is_dir()) {
            warn!(path = %entry.path().display(), error = %e, "Failed to remove entry");
            skipped += 1;
        }
    }

    if skipped > 0 {
        warn!(root = %root.display(), skipped, "Some entries could not be removed");
    }
    fs::remove_dir(root)
        .map_err(|e| RewindError::from_io(root, format!("Failed to remove {:?}", root), e))?;
    Ok(skipped)
}

/// 统计目录树中的文件数量（不含目录）
pub fn count_files(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_dir() {
            total += 1;
        }
    }
    Ok(total)
}
