// Rewind - 进程检测模块
// 判断指定的可执行文件当前是否在运行，用于恢复前的保护检查

use crate::error::{Result, RewindError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 进程保护检查
///
/// 恢复引擎只依赖此 trait，测试中可以替换为固定结果的实现。
pub trait ProcessGuard: Send + Sync {
    /// 检查 `exe_path` 对应的进程是否正在运行
    ///
    /// # 返回
    /// * `Ok(bool)` - 是否找到匹配的进程
    /// * `Err(CapabilityUnavailable)` - 当前平台无法枚举进程
    fn is_running(&self, exe_path: &Path) -> Result<bool>;
}

/// 基于操作系统进程列表的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl ProcessGuard for SystemProcesses {
    fn is_running(&self, exe_path: &Path) -> Result<bool> {
        let running = executable_paths()?;
        debug!(count = running.len(), "Enumerated live processes");
        Ok(running.iter().any(|p| same_executable(p, exe_path)))
    }
}

/// 进程检测结果，无法枚举时按"未运行"处理
///
/// 这是一个尽力而为的检查：没有进程枚举能力的平台上，
/// 恢复会在游戏可能仍在运行的情况下继续进行。
pub fn is_running_or_assume_not(guard: &dyn ProcessGuard, exe_path: &Path) -> Result<bool> {
    match guard.is_running(exe_path) {
        Err(RewindError::CapabilityUnavailable) => {
            warn!(
                exe = %exe_path.display(),
                "Process enumeration unavailable, assuming the guarded process is not running"
            );
            Ok(false)
        }
        other => other,
    }
}

/// 不区分大小写地比较两个可执行文件路径
pub fn same_executable(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// 可执行文件在进程运行期间被替换（例如游戏更新）后，
/// 内核会在 `/proc/<pid>/exe` 的链接目标后追加 `" (deleted)"`
#[cfg(any(target_os = "linux", test))]
fn strip_deleted_suffix(path: PathBuf) -> PathBuf {
    const DELETED: &str = " (deleted)";
    match path.to_str().and_then(|s| s.strip_suffix(DELETED)) {
        Some(stripped) => PathBuf::from(stripped),
        None => path,
    }
}

/// 列出所有可读取的进程可执行文件路径
///
/// 已退出、无权限访问或僵尸进程在读取 `/proc/<pid>/exe` 时会失败，
/// 这些进程直接跳过，不会中断扫描。
#[cfg(target_os = "linux")]
pub fn executable_paths() -> Result<Vec<PathBuf>> {
    use std::fs;

    let proc_root = Path::new("/proc");
    let entries =
        fs::read_dir(proc_root).map_err(|e| RewindError::from_io(proc_root, "read /proc", e))?;

    let paths = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
        })
        .filter_map(|entry| fs::read_link(entry.path().join("exe")).ok())
        .map(strip_deleted_suffix)
        .collect();

    Ok(paths)
}

/// 通过 Toolhelp 快照列出进程，并查询每个进程的完整映像路径
///
/// 无法打开的进程（权限不足或已退出）直接跳过。
#[cfg(windows)]
pub fn executable_paths() -> Result<Vec<PathBuf>> {
    use std::ffi::OsString;
    use std::io;
    use std::mem;
    use std::os::windows::ffi::OsStringExt;
    use winapi::shared::minwindef::{DWORD, FALSE};
    use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
    use winapi::um::processthreadsapi::OpenProcess;
    use winapi::um::tlhelp32::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use winapi::um::winbase::QueryFullProcessImageNameW;
    use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

    let mut paths = Vec::new();

    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0);
        if snapshot == INVALID_HANDLE_VALUE {
            return Err(RewindError::Io {
                context: "Failed to create process snapshot".to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let mut entry: PROCESSENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as DWORD;

        let mut more = Process32FirstW(snapshot, &mut entry) != FALSE;
        while more {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, entry.th32ProcessID);
            if !handle.is_null() {
                let mut buf = [0u16; 1024];
                let mut len = buf.len() as DWORD;
                if QueryFullProcessImageNameW(handle, 0, buf.as_mut_ptr(), &mut len) != FALSE {
                    paths.push(PathBuf::from(OsString::from_wide(&buf[..len as usize])));
                }
                CloseHandle(handle);
            }
            more = Process32NextW(snapshot, &mut entry) != FALSE;
        }

        CloseHandle(snapshot);
    }

    Ok(paths)
}

/// 其他平台没有可用的进程枚举实现
#[cfg(not(any(target_os = "linux", windows)))]
pub fn executable_paths() -> Result<Vec<PathBuf>> {
    Err(RewindError::CapabilityUnavailable)
}
