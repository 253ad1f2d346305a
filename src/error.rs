// Rewind - 错误类型模块
// 定义快照与恢复引擎的全部错误分类

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 引擎操作的结果类型
pub type Result<T> = std::result::Result<T, RewindError>;

/// 快照与恢复过程中可能出现的错误
#[derive(Debug, Error)]
pub enum RewindError {
    /// 路径不存在
    #[error("Path not found: {0:?}")]
    NotFound(PathBuf),

    /// 没有读取或写入权限
    #[error("Access denied: {0:?}")]
    AccessDenied(PathBuf),

    /// 目标已存在（同一秒内对同名源目录做了两次快照）
    #[error("Destination already exists: {0:?}")]
    AlreadyExists(PathBuf),

    /// 备份编号超出范围
    #[error("Invalid backup index: {index}. Available backups are from 1 to {len}")]
    Index { index: usize, len: usize },

    /// 其他 I/O 错误
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// 受保护的进程正在运行，拒绝恢复
    #[error("Guarded process is running: {0:?}")]
    TargetInUse(PathBuf),

    /// 恢复过程中失败（目标可能处于部分写入状态）
    #[error("Restore failed: {context}")]
    RestoreFailed {
        context: String,
        #[source]
        source: Box<RewindError>,
    },

    /// 当前平台不支持枚举进程
    #[error("Process enumeration is not available on this platform")]
    CapabilityUnavailable,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RewindError {
    /// 按 I/O 错误类型归类，并附加路径信息
    pub fn from_io(path: impl Into<PathBuf>, context: impl Into<String>, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.into()),
            io::ErrorKind::PermissionDenied => Self::AccessDenied(path.into()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.into()),
            _ => Self::Io {
                context: context.into(),
                source: err,
            },
        }
    }

    /// 将底层错误包装为恢复失败
    pub fn restore_failed(context: impl Into<String>, cause: RewindError) -> Self {
        Self::RestoreFailed {
            context: context.into(),
            source: Box::new(cause),
        }
    }

    /// 是否属于无副作用的校验类错误
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AccessDenied(_) | Self::Index { .. } | Self::Config(_)
        )
    }
}
