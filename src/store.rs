// Rewind - 备份索引模块
// 在内存中维护最近的备份列表（最新的在前，最多 9 个）

use crate::error::{Result, RewindError};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

/// 内存中保留的备份数量上限，对应热键 1-9
pub const CAPACITY: usize = 9;

/// 未完成的快照目录后缀
pub const PARTIAL_SUFFIX: &str = ".partial";

/// 一次已完成的快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    /// 快照根目录的绝对路径
    pub path: PathBuf,

    /// 创建时间（新快照取自文件夹名的时间戳，启动加载时取目录修改时间）
    pub created_at: NaiveDateTime,
}

impl BackupEntry {
    pub fn new(path: PathBuf, created_at: NaiveDateTime) -> Self {
        Self { path, created_at }
    }

    /// 快照文件夹名称
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// 最近备份的有序集合
///
/// 索引 0 是最新的备份。淘汰只会从索引中移除条目，
/// 磁盘上的快照目录不会被删除。
#[derive(Debug, Default, Clone)]
pub struct BackupStore {
    entries: Vec<BackupEntry>,
}

impl BackupStore {
    /// 创建空的备份索引
    pub fn new() -> Self {
        Self::default()
    }

    /// 从备份根目录重建索引
    ///
    /// 列出根目录下的直接子目录，按修改时间降序排列，保留前 9 个。
    /// 根目录不存在时会创建一个空目录并返回空索引。
    ///
    /// # 参数
    /// * `backup_root` - 备份根目录
    ///
    /// # 返回
    /// * `Ok(BackupStore)` - 加载的索引
    /// * `Err(RewindError)` - 根目录无法读取或创建
    pub fn load_from_disk(backup_root: &Path) -> Result<Self> {
        if !backup_root.exists() {
            fs::create_dir_all(backup_root)
                .map_err(|e| RewindError::from_io(backup_root, "Failed to create backup root", e))?;
            info!(root = %backup_root.display(), "Backup directory created");
            return Ok(Self::new());
        }

        let read = fs::read_dir(backup_root).map_err(|e| RewindError::Io {
            context: format!("Cannot read backup directory {:?}", backup_root),
            source: e,
        })?;

        let mut folders: Vec<(PathBuf, SystemTime)> = read
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let meta = fs::metadata(&path).ok()?;
                if !meta.is_dir() || path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                    return None;
                }
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((path, mtime))
            })
            .collect();

        // 修改时间相同则按名称倒序（名称以时间戳结尾）
        folders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let entries: Vec<BackupEntry> = folders
            .into_iter()
            .take(CAPACITY)
            .map(|(path, mtime)| {
                let created_at = DateTime::<Local>::from(mtime).naive_local();
                BackupEntry::new(path, created_at)
            })
            .collect();

        info!(count = entries.len(), "Loaded existing backups");
        Ok(Self { entries })
    }

    /// 在索引 0 处插入新备份，超出上限的最旧条目被移出索引
    ///
    /// 已存在相同路径的条目会先被移除，保证索引中没有重复路径。
    pub fn push(&mut self, entry: BackupEntry) {
        self.entries.retain(|e| e.path != entry.path);
        self.entries.insert(0, entry);
        self.entries.truncate(CAPACITY);
    }

    /// 按 1 起始的编号查找备份（与热键编号一致）
    ///
    /// 编号超出 `[1, len]` 时返回 `Index` 错误，不做截断。
    pub fn get(&self, index: usize) -> Result<&BackupEntry> {
        if index == 0 || index > self.entries.len() {
            return Err(RewindError::Index {
                index,
                len: self.entries.len(),
            });
        }
        Ok(&self.entries[index - 1])
    }

    /// 所有备份（最新的在前）
    pub fn entries(&self) -> &[BackupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
