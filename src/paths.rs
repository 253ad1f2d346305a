// Rewind - 路径解析模块
// 负责路径规范化、环境变量展开以及读写权限校验

use crate::error::{Result, RewindError};
use std::fs;
use std::path::{Path, PathBuf};

/// 校验路径存在且可读
///
/// 目录通过尝试列出内容判断，文件通过尝试打开判断。
///
/// # 返回
/// * `Ok(())` - 路径可读
/// * `Err(NotFound)` - 路径不存在
/// * `Err(AccessDenied)` - 没有读取权限
pub fn validate_readable(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| RewindError::from_io(path, "stat", e))?;

    if meta.is_dir() {
        fs::read_dir(path).map_err(|e| RewindError::from_io(path, "read dir", e))?;
    } else {
        fs::File::open(path).map_err(|e| RewindError::from_io(path, "open", e))?;
    }
    Ok(())
}

/// 校验路径是一个存在且可写的目录
///
/// 只检查权限位（`readonly()`，即是否存在任一写权限位），不检查当前用户的
/// 实际写权限，也不会在目录中创建任何探测文件。例如不属于当前用户的 755 目录
/// 能通过此检查，真正的写入错误要到创建快照目录时才会报告。
/// 路径存在但不是目录时视为 `NotFound`。
pub fn validate_writable_dir(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|e| RewindError::from_io(path, "stat", e))?;

    if !meta.is_dir() {
        return Err(RewindError::NotFound(path.to_path_buf()));
    }
    if meta.permissions().readonly() {
        return Err(RewindError::AccessDenied(path.to_path_buf()));
    }
    Ok(())
}

/// 展开路径字符串中的环境变量引用
///
/// 支持 `$VAR`、`${VAR}` 和 Windows 风格的 `%VAR%`。
/// 未定义的变量保持原样，不做任何 I/O。
///
/// # 示例
/// ```
/// // 若 HOME=/home/me
/// // "$HOME/saves"      -> "/home/me/saves"
/// // "%APPDATA%\\Game"  -> "%APPDATA%\\Game"（未定义时保持不变）
/// ```
pub fn expand_env(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '$' if chars.get(i + 1) == Some(&'{') => {
                if let Some(end) = chars[i + 2..].iter().position(|&c| c == '}') {
                    let name: String = chars[i + 2..i + 2 + end].iter().collect();
                    let raw: String = chars[i..i + 3 + end].iter().collect();
                    out.push_str(&lookup(&name).unwrap_or(raw));
                    i += 3 + end;
                    continue;
                }
            }
            '$' => {
                let len = chars[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                    .count();
                if len > 0 {
                    let name: String = chars[i + 1..i + 1 + len].iter().collect();
                    let raw: String = chars[i..i + 1 + len].iter().collect();
                    out.push_str(&lookup(&name).unwrap_or(raw));
                    i += 1 + len;
                    continue;
                }
            }
            '%' => {
                if let Some(end) = chars[i + 1..].iter().position(|&c| c == '%') {
                    if end > 0 {
                        let name: String = chars[i + 1..i + 1 + end].iter().collect();
                        if let Some(value) = lookup(&name) {
                            out.push_str(&value);
                            i += 2 + end;
                            continue;
                        }
                    }
                }
            }
            _ => {}
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn lookup(name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name).ok()
}

/// 获取规范化路径的最后一段作为文件夹名称
///
/// 例如：`C:\Users\me\save00\` -> `save00`
/// 对于驱动器根路径：`D:\` -> `D_Drive`
pub fn folder_name(path: &Path) -> String {
    let cleaned = path_clean::clean(path);
    if let Some(name) = cleaned.file_name() {
        name.to_string_lossy().to_string()
    } else {
        let path_str = cleaned.to_string_lossy();
        match path_str.find(':') {
            Some(colon_idx) if colon_idx > 0 => {
                let drive = &path_str[colon_idx - 1..colon_idx];
                format!("{}_Drive", drive.to_uppercase())
            }
            _ => "Root_Backup".to_string(),
        }
    }
}

/// 计算恢复目标路径：`parent(src) / basename(src)`
///
/// 无论源目录当前是否存在，恢复总是落在配置的原始位置上。
pub fn restore_target(configured_src: &Path) -> PathBuf {
    let cleaned = path_clean::clean(configured_src);
    match (cleaned.parent(), cleaned.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => cleaned,
    }
}
