// Rewind - 快照模块
// 将存档目录完整复制到以时间戳命名的新文件夹中

use crate::copier::copy_tree;
use crate::error::{Result, RewindError};
use crate::paths::{folder_name, validate_readable, validate_writable_dir};
use crate::store::{BackupEntry, BackupStore, PARTIAL_SUFFIX};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

/// 快照文件夹名中的时间戳格式
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 生成快照文件夹名：`<源目录名>_<YYYYMMDD_HHMMSS>`
pub fn snapshot_name(src: &Path, at: NaiveDateTime) -> String {
    format!("{}_{}", folder_name(src), at.format(TIMESTAMP_FORMAT))
}

/// 以当前本地时间创建快照
pub fn take_snapshot(src: &Path, dst_dir: &Path, store: &mut BackupStore) -> Result<BackupEntry> {
    take_snapshot_at(src, dst_dir, store, Local::now().naive_local())
}

/// 以指定时间创建快照
///
/// # 流程
/// 1. 校验源目录可读、备份根目录可写（失败时不产生任何文件）
/// 2. 计算快照名，若同名目录已存在则返回 `AlreadyExists`
/// 3. 复制到 `<名称>.partial`，完成后重命名为最终名称
/// 4. 将新条目放入备份索引
///
/// 时间戳精度为一秒，同一秒内对同名源目录做两次快照会返回 `AlreadyExists`。
/// 复制中途失败时，`.partial` 目录保留在磁盘上，不做回滚。
///
/// # 参数
/// * `src` - 存档源目录
/// * `dst_dir` - 备份根目录
/// * `store` - 备份索引
/// * `at` - 快照时间
pub fn take_snapshot_at(
    src: &Path,
    dst_dir: &Path,
    store: &mut BackupStore,
    at: NaiveDateTime,
) -> Result<BackupEntry> {
    validate_readable(src)?;
    if !src.is_dir() {
        return Err(RewindError::Io {
            context: format!("Source {:?} is not a directory", src),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        });
    }
    validate_writable_dir(dst_dir)?;

    let name = snapshot_name(src, at);
    let final_path = dst_dir.join(&name);
    let partial_path = dst_dir.join(format!("{}{}", name, PARTIAL_SUFFIX));

    if fs::symlink_metadata(&final_path).is_ok() {
        return Err(RewindError::AlreadyExists(final_path));
    }

    info!(from = %src.display(), to = %final_path.display(), "Copying folder");
    let files = copy_tree(src, &partial_path, |_| {})?;

    fs::rename(&partial_path, &final_path).map_err(|e| {
        RewindError::from_io(
            &final_path,
            format!("Failed to rename {:?} to {:?}", partial_path, final_path),
            e,
        )
    })?;
    info!(files, to = %final_path.display(), "Folder copied successfully");

    let entry = BackupEntry::new(final_path, at);
    store.push(entry.clone());
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn name_uses_basename_and_timestamp() {
        assert_eq!(
            snapshot_name(Path::new("/games/Noita/save00/"), noon()),
            "save00_20240101_120000"
        );
    }

    #[test]
    fn snapshot_copies_into_timestamped_folder() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("save00");
        let dst = dir.path().join("backups");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("a.dat"), b"alpha").unwrap();
        fs::write(src.join("b.dat"), b"beta").unwrap();

        let mut store = BackupStore::new();
        let entry = take_snapshot_at(&src, &dst, &mut store, noon()).unwrap();

        assert_eq!(entry.path, dst.join("save00_20240101_120000"));
        assert_eq!(entry.created_at, noon());
        assert_eq!(fs::read(entry.path.join("a.dat")).unwrap(), b"alpha");
        assert_eq!(fs::read(entry.path.join("b.dat")).unwrap(), b"beta");
        assert!(!dst.join("save00_20240101_120000.partial").exists());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn same_second_collides() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("save00");
        let dst = dir.path().join("backups");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();

        let mut store = BackupStore::new();
        take_snapshot_at(&src, &dst, &mut store, noon()).unwrap();
        let second = take_snapshot_at(&src, &dst, &mut store, noon());

        assert!(matches!(second, Err(RewindError::AlreadyExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn validation_failure_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("backups");
        fs::create_dir_all(&dst).unwrap();

        let mut store = BackupStore::new();
        let missing = dir.path().join("save00");
        let res = take_snapshot_at(&missing, &dst, &mut store, noon());

        assert!(matches!(res, Err(RewindError::NotFound(_))));
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
        assert!(store.is_empty());

        let src = dir.path().join("real");
        fs::create_dir_all(&src).unwrap();
        let no_root = dir.path().join("nowhere");
        let res = take_snapshot_at(&src, &no_root, &mut store, noon());
        assert!(matches!(res, Err(RewindError::NotFound(_))));
        assert!(!no_root.exists());
    }
}
