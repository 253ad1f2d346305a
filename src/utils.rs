// Rewind - 工具函数模块
// 提供日志和终端输出用的格式化辅助功能

use std::path::Path;
use std::time::Duration;

/// 缩短存档路径用于显示
///
/// 移除 `LocalLow` 及其之前的部分，并用 `...` 替换。
/// 不包含 `LocalLow` 的路径原样返回。
///
/// # 示例
/// ```
/// // C:\Users\me\AppData\LocalLow\Nolla_Games_Noita\save00 -> ...\Nolla_Games_Noita\save00
/// ```
pub fn shorten_path(path: &Path) -> String {
    const MARKER: &str = "LocalLow";

    let s = path.to_string_lossy();
    match s.find(MARKER) {
        Some(idx) => format!("...{}", &s[idx + MARKER.len()..]),
        None => s.to_string(),
    }
}

/// 格式化耗时为人类可读的时间长度
///
/// 一分钟以内保留一位小数，例如 `"3.2s"`、`"2m 5s"`、`"1h 1m 1s"`。
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}
