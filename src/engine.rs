// Rewind - 引擎模块
// 对外暴露快照和恢复两个入口，并保证同一时间只有一个操作在执行

use crate::alert::{AlertSink, Severity, SilentAlert};
use crate::error::{Result, RewindError};
use crate::process::{ProcessGuard, SystemProcesses};
use crate::progress::ProgressSink;
use crate::restore::{restore, Guard, RestoreSummary};
use crate::snapshot::take_snapshot_at;
use crate::store::{BackupEntry, BackupStore};
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// 快照时间来源
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// 引擎所需的已解析配置（路径已展开环境变量）
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 存档源目录，同时也是恢复目标
    pub src_path: PathBuf,

    /// 备份根目录
    pub dst_dir: PathBuf,

    /// 恢复前需要确认未运行的可执行文件
    pub guard_exe_path: Option<PathBuf>,
}

/// 快照与恢复引擎
///
/// 备份索引放在互斥锁中，两个入口在整个执行期间持有该锁，
/// 因此快照与恢复、恢复与恢复之间不会交错执行。
pub struct Engine {
    settings: EngineSettings,
    store: Mutex<BackupStore>,
    guard: Box<dyn ProcessGuard>,
    alerts: Box<dyn AlertSink>,
    clock: Clock,
}

impl Engine {
    /// 使用空索引、系统进程检测、静音提示和本地时钟创建引擎
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            store: Mutex::new(BackupStore::new()),
            guard: Box::new(SystemProcesses),
            alerts: Box::new(SilentAlert),
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    /// 创建引擎并从备份根目录加载已有备份
    pub fn open(settings: EngineSettings) -> Result<Self> {
        let store = BackupStore::load_from_disk(&settings.dst_dir)?;
        Ok(Self::new(settings).with_store(store))
    }

    pub fn with_store(mut self, store: BackupStore) -> Self {
        self.store = Mutex::new(store);
        self
    }

    pub fn with_guard(mut self, guard: Box<dyn ProcessGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_alerts(mut self, alerts: Box<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// 当前索引的副本（最新的在前）
    pub fn backups(&self) -> Vec<BackupEntry> {
        self.lock().entries().to_vec()
    }

    /// 对源目录做一次快照
    ///
    /// 成功时发出一次提示音。提示音在释放索引锁之后发出。
    pub fn request_snapshot(&self) -> Result<BackupEntry> {
        let result = {
            let mut store = self.lock();
            let at = (self.clock)();
            take_snapshot_at(&self.settings.src_path, &self.settings.dst_dir, &mut store, at)
        };

        match &result {
            Ok(_) => self.alerts.on_success(),
            Err(e) => log_failure("Snapshot", e),
        }
        result
    }

    /// 恢复第 `index` 个备份（1 起始）
    ///
    /// 成功时提示一次；因保护进程正在运行而中止时连续提示两次。
    /// 提示音在释放索引锁之后发出，不会阻塞下一个请求。
    pub fn request_restore(
        &self,
        index: usize,
        sink: &mut dyn ProgressSink,
    ) -> Result<RestoreSummary> {
        let result = {
            let store = self.lock();
            info!(index, "Restore requested");

            let guard = self.settings.guard_exe_path.as_deref().map(|exe_path| Guard {
                checker: &*self.guard,
                exe_path,
            });
            restore(&store, index, &self.settings.src_path, guard, sink)
        };

        match &result {
            Ok(_) => self.alerts.on_success(),
            Err(RewindError::TargetInUse(_)) => self.alerts.on_alert(Severity::Double),
            Err(e) => log_failure("Restore", e),
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, BackupStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 校验类错误没有副作用，只记警告；其余错误可能留下部分写入的目录
fn log_failure(operation: &str, err: &RewindError) {
    if err.is_validation() {
        warn!(error = %err, "{} rejected", operation);
    } else {
        error!(error = %err, "{} failed", operation);
    }
}
