// Rewind - 存档快照与恢复工具
// 模块声明文件

/// 提示音模块
pub mod alert;

/// 交互式终端界面模块
pub mod cli;

/// 配置文件管理模块
pub mod config;

/// 目录树复制与删除模块
pub mod copier;

/// 快照与恢复引擎入口
pub mod engine;

/// 错误类型模块
pub mod error;

/// 触发键映射模块
pub mod hotkey;

/// 路径解析与校验模块
pub mod paths;

/// 进程检测模块
pub mod process;

/// 恢复进度模块
pub mod progress;

/// 恢复模块
pub mod restore;

/// 快照模块
pub mod snapshot;

/// 备份索引模块
pub mod store;

/// 工具函数模块
pub mod utils;

pub use engine::{Engine, EngineSettings};
pub use error::{Result, RewindError};
pub use restore::RestoreSummary;
pub use store::{BackupEntry, BackupStore};
