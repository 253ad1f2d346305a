// Rewind - 提示音模块
// 快照/恢复成功时提示一次，恢复因游戏运行被拒绝时提示两次

use console::Term;
use std::thread;
use std::time::Duration;

/// 警报强度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 响一次
    Single,
    /// 连响两次
    Double,
}

impl Severity {
    pub fn beeps(self) -> usize {
        match self {
            Severity::Single => 1,
            Severity::Double => 2,
        }
    }
}

/// 提示音接收端
pub trait AlertSink: Send + Sync {
    /// 操作成功
    fn on_success(&self) {
        self.on_alert(Severity::Single);
    }

    /// 发出指定强度的警报
    fn on_alert(&self, severity: Severity);
}

/// 静音
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlert;

impl AlertSink for SilentAlert {
    fn on_alert(&self, _severity: Severity) {}
}

/// 通过终端响铃字符（BEL）发声
#[derive(Debug, Clone, Copy)]
pub struct TerminalBell {
    enabled: bool,
}

impl TerminalBell {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl AlertSink for TerminalBell {
    fn on_alert(&self, severity: Severity) {
        if !self.enabled {
            return;
        }
        let term = Term::stderr();
        for i in 0..severity.beeps() {
            if i > 0 {
                thread::sleep(Duration::from_millis(300));
            }
            // 响铃失败不影响主流程
            let _ = term.write_str("\x07");
        }
    }
}
