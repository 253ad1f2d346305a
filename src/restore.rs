// Rewind - 恢复模块
// 将指定编号的备份复制回原存档位置，覆盖现有内容

use crate::copier::{copy_tree, count_files, remove_tree_best_effort};
use crate::error::{Result, RewindError};
use crate::paths::{restore_target, validate_readable};
use crate::process::{is_running_or_assume_not, ProcessGuard};
use crate::progress::ProgressSink;
use crate::store::BackupStore;
use crate::utils::shorten_path;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 备份内部可能额外包裹的一层存档目录名
pub const NESTED_SAVE_DIR: &str = "save00";

/// 单次恢复的阶段
///
/// `Idle -> Validating -> Guarding -> Deleting -> Copying -> Done`，
/// 除 `Idle` 和 `Done` 外每个阶段都可能直接进入 `Failed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    Validating,
    Guarding,
    Deleting,
    Copying,
    Done,
    Failed,
}

/// 恢复完成后的统计
#[derive(Debug, Clone)]
pub struct RestoreSummary {
    /// 实际复制来源（可能经过 save00 调整）
    pub source: PathBuf,

    /// 恢复目标（配置的源目录）
    pub target: PathBuf,

    /// 复制的文件数
    pub files_copied: u64,

    /// 预先统计的文件总数
    pub total_files: u64,

    /// 清理目标时未能删除的子条目数
    pub skipped_deletions: usize,

    /// 耗时
    pub elapsed: Duration,
}

/// 进程保护设置：检查器与被保护的可执行文件
#[derive(Clone, Copy)]
pub struct Guard<'a> {
    pub checker: &'a dyn ProcessGuard,
    pub exe_path: &'a Path,
}

/// 调整恢复来源
///
/// 如果备份中存在 `save00` 子目录，则使用该子目录；否则使用备份根目录。
/// 这是固定约定，不做任何搜索。
pub fn adjust_restore_source(backup_path: &Path) -> PathBuf {
    let nested = backup_path.join(NESTED_SAVE_DIR);
    if nested.is_dir() {
        debug!(path = %nested.display(), "'save00' folder found within the backup");
        nested
    } else {
        backup_path.to_path_buf()
    }
}

struct Tracker {
    phase: RestorePhase,
}

impl Tracker {
    fn enter(&mut self, phase: RestorePhase) {
        debug!(from = ?self.phase, to = ?phase, "Restore phase");
        self.phase = phase;
    }

    fn fail(&mut self, err: RewindError) -> RewindError {
        warn!(phase = ?self.phase, error = %err, "Restore failed");
        self.phase = RestorePhase::Failed;
        err
    }
}

/// 将第 `index` 个备份恢复到配置的源目录位置
///
/// # 流程
/// 1. 校验：查找备份（编号越界返回 `Index`），调整来源并统计文件数
/// 2. 保护：若配置了保护进程且其正在运行，返回 `TargetInUse`，不触碰目标
/// 3. 删除：递归删除目标；子条目删除失败只记录，根目录删除失败返回 `RestoreFailed`
/// 4. 复制：逐个文件复制并报告进度，任何一个文件失败立即中止
///
/// 保护检查与删除之间不是原子的，检查只是尽力而为。
///
/// # 参数
/// * `store` - 备份索引
/// * `index` - 1 起始的备份编号
/// * `configured_src` - 配置的存档源目录
/// * `guard` - 可选的进程保护
/// * `sink` - 进度接收端
pub fn restore(
    store: &BackupStore,
    index: usize,
    configured_src: &Path,
    guard: Option<Guard<'_>>,
    sink: &mut dyn ProgressSink,
) -> Result<RestoreSummary> {
    restore_with(store, index, configured_src, guard, sink, remove_tree_best_effort)
}

/// 与 [`restore`] 相同，但清理目标时使用 `clear`
pub(crate) fn restore_with(
    store: &BackupStore,
    index: usize,
    configured_src: &Path,
    guard: Option<Guard<'_>>,
    sink: &mut dyn ProgressSink,
    clear: impl FnOnce(&Path) -> Result<usize>,
) -> Result<RestoreSummary> {
    let started = Instant::now();
    let mut tracker = Tracker {
        phase: RestorePhase::Idle,
    };

    tracker.enter(RestorePhase::Validating);
    let entry = store.get(index).map_err(|e| tracker.fail(e))?;
    let source = adjust_restore_source(&entry.path);
    validate_readable(&source).map_err(|e| tracker.fail(e))?;
    let total_files = count_files(&source).map_err(|e| tracker.fail(e))?;

    tracker.enter(RestorePhase::Guarding);
    if let Some(guard) = guard {
        let running =
            is_running_or_assume_not(guard.checker, guard.exe_path).map_err(|e| tracker.fail(e))?;
        if running {
            return Err(tracker.fail(RewindError::TargetInUse(guard.exe_path.to_path_buf())));
        }
    }

    let target = restore_target(configured_src);
    info!(
        from = %shorten_path(&source),
        to = %shorten_path(&target),
        "Restoring backup"
    );

    tracker.enter(RestorePhase::Deleting);
    let skipped_deletions = clear(&target).map_err(|e| {
        tracker.fail(RewindError::restore_failed(
            format!("could not clear {:?}", target),
            e,
        ))
    })?;

    tracker.enter(RestorePhase::Copying);
    sink.start(total_files);
    let copied = copy_tree(&source, &target, |rel| sink.tick(rel));
    let files_copied = match copied {
        Ok(n) => {
            sink.finish(true);
            n
        }
        Err(e) => {
            sink.finish(false);
            return Err(tracker.fail(RewindError::restore_failed(
                format!("copy from {:?} to {:?} interrupted", source, target),
                e,
            )));
        }
    };

    tracker.enter(RestorePhase::Done);
    info!(files = files_copied, to = %shorten_path(&target), "Backup restored successfully");

    Ok(RestoreSummary {
        source,
        target,
        files_copied,
        total_files,
        skipped_deletions,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copier::remove_tree_with;
    use crate::progress::NoProgress;
    use crate::store::BackupEntry;
    use chrono::NaiveDate;
    use std::fs;

    struct Fixed(bool);

    impl ProcessGuard for Fixed {
        fn is_running(&self, _exe_path: &Path) -> Result<bool> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct Counting {
        total: u64,
        ticks: u64,
        finished: Option<bool>,
    }

    impl ProgressSink for Counting {
        fn start(&mut self, total: u64) {
            self.total = total;
        }
        fn tick(&mut self, _rel_path: &Path) {
            self.ticks += 1;
        }
        fn finish(&mut self, success: bool) {
            self.finished = Some(success);
        }
    }

    fn store_with(path: PathBuf) -> BackupStore {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut store = BackupStore::new();
        store.push(BackupEntry::new(path, at));
        store
    }

    #[test]
    fn adjusts_only_when_nested_dir_exists() {
        let dir = tempfile::tempdir().unwrap();
        let flat = dir.path().join("flat");
        fs::create_dir_all(&flat).unwrap();
        assert_eq!(adjust_restore_source(&flat), flat);

        let wrapped = dir.path().join("wrapped");
        fs::create_dir_all(wrapped.join("save00")).unwrap();
        assert_eq!(adjust_restore_source(&wrapped), wrapped.join("save00"));

        // 同名文件不算
        let file_named = dir.path().join("file_named");
        fs::create_dir_all(&file_named).unwrap();
        fs::write(file_named.join("save00"), b"x").unwrap();
        assert_eq!(adjust_restore_source(&file_named), file_named);
    }

    #[test]
    fn restores_nested_backup_over_target_with_progress() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backups/save00_20240101_120000");
        fs::create_dir_all(backup.join("save00/world")).unwrap();
        fs::write(backup.join("save00/a.dat"), b"old a").unwrap();
        fs::write(backup.join("save00/world/b.dat"), b"old b").unwrap();

        let live = dir.path().join("live/save00");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("a.dat"), b"new a").unwrap();
        fs::write(live.join("stray.dat"), b"gone after restore").unwrap();

        let store = store_with(backup.clone());
        let mut sink = Counting::default();
        let summary = restore(&store, 1, &live, None, &mut sink).unwrap();

        assert_eq!(summary.source, backup.join("save00"));
        assert_eq!(summary.files_copied, 2);
        assert_eq!(sink.total, 2);
        assert_eq!(sink.ticks, 2);
        assert_eq!(sink.finished, Some(true));
        assert_eq!(fs::read(live.join("a.dat")).unwrap(), b"old a");
        assert_eq!(fs::read(live.join("world/b.dat")).unwrap(), b"old b");
        assert!(!live.join("stray.dat").exists());
    }

    #[test]
    fn running_guard_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("a.dat"), b"backup").unwrap();

        let live = dir.path().join("save00");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("a.dat"), b"live").unwrap();

        let store = store_with(backup);
        let exe = PathBuf::from("/opt/noita/noita.exe");
        let guard = Guard {
            checker: &Fixed(true),
            exe_path: &exe,
        };
        let res = restore(&store, 1, &live, Some(guard), &mut NoProgress);

        assert!(matches!(res, Err(RewindError::TargetInUse(_))));
        assert_eq!(fs::read(live.join("a.dat")).unwrap(), b"live");
    }

    #[test]
    fn out_of_range_index_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("save00");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("a.dat"), b"live").unwrap();

        let store = BackupStore::new();
        for index in [0, 1, 10] {
            let res = restore(&store, index, &live, None, &mut NoProgress);
            assert!(matches!(res, Err(RewindError::Index { .. })));
        }
        assert_eq!(fs::read(live.join("a.dat")).unwrap(), b"live");
    }

    #[test]
    fn missing_target_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("a.dat"), b"backup").unwrap();

        let live = dir.path().join("LocalLow/Game/save00");
        let store = store_with(backup);
        let summary = restore(&store, 1, &live, None, &mut NoProgress).unwrap();

        assert_eq!(summary.target, live);
        assert_eq!(fs::read(live.join("a.dat")).unwrap(), b"backup");
    }

    #[cfg(unix)]
    #[test]
    fn special_file_aborts_copy_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backups/save00_20240101_120000");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("a.dat"), b"a").unwrap();
        let _listener = std::os::unix::net::UnixListener::bind(backup.join("b.sock")).unwrap();
        fs::write(backup.join("c.dat"), b"c").unwrap();

        let live = dir.path().join("save00");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("a.dat"), b"live").unwrap();

        let store = store_with(backup);
        let mut sink = Counting::default();
        let err = restore(&store, 1, &live, None, &mut sink).unwrap_err();

        match err {
            RewindError::RestoreFailed { source, .. } => {
                assert!(matches!(*source, RewindError::Io { .. }))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(sink.total, 3);
        assert_eq!(sink.ticks, 1);
        assert_eq!(sink.finished, Some(false));
        assert_eq!(fs::read(live.join("a.dat")).unwrap(), b"a");
        assert!(!live.join("c.dat").exists());
    }

    #[test]
    fn stuck_target_entry_fails_before_copying() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup");
        fs::create_dir_all(&backup).unwrap();
        fs::write(backup.join("a.dat"), b"backup").unwrap();

        let live = dir.path().join("save00");
        fs::create_dir_all(live.join("world")).unwrap();
        fs::write(live.join("a.dat"), b"live").unwrap();
        fs::write(live.join("world/locked.dat"), b"held open").unwrap();

        let locked = live.join("world/locked.dat");
        let mut skipped = 0;
        let store = store_with(backup.clone());
        let mut sink = Counting::default();
        let err = restore_with(&store, 1, &live, None, &mut sink, |target| {
            remove_tree_with(target, |path, is_dir| {
                let res = if path == locked {
                    Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                } else if is_dir {
                    fs::remove_dir(path)
                } else {
                    fs::remove_file(path)
                };
                if res.is_err() {
                    skipped += 1;
                }
                res
            })
        })
        .unwrap_err();

        assert!(matches!(err, RewindError::RestoreFailed { .. }));
        // locked.dat 以及因此非空的 world 目录
        assert_eq!(skipped, 2);
        assert_eq!(sink.total, 0);
        assert_eq!(sink.finished, None);
        assert!(locked.exists());
        assert!(!live.join("a.dat").exists());
        assert_eq!(fs::read(backup.join("a.dat")).unwrap(), b"backup");
    }
}
