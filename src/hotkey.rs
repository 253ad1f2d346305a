// Rewind - 触发键模块
// 将配置中的热键字符串映射为终端按键，并解析"恢复键 + 数字"的组合

use crate::config::AppConfig;
use crate::error::{Result, RewindError};

/// 按键触发的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Snapshot,
    Restore(usize),
    Exit,
}

/// 取热键字符串最后一段作为终端触发键
///
/// 修饰键在终端中无法可靠读取，因此只保留主键：
/// `"ctrl+shift+x"` -> `'x'`，`"shift+V"` -> `'v'`。
/// 主键不是单个字符时返回 `None`。
pub fn trigger_key(hotkey: &str) -> Option<char> {
    let last = hotkey.rsplit('+').next()?.trim();
    let mut chars = last.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_ascii_digit() => Some(c.to_ascii_lowercase()),
        _ => None,
    }
}

/// 按键映射
///
/// 恢复键按下后进入等待状态，下一个按键为 1-9 时触发对应的恢复，
/// 其他按键取消等待。
#[derive(Debug, Clone)]
pub struct KeyMap {
    copy: char,
    restore: char,
    exit: char,
    armed: bool,
}

impl KeyMap {
    pub fn new(copy: char, restore: char, exit: char) -> Result<Self> {
        if copy == restore || copy == exit || restore == exit {
            return Err(RewindError::Config(format!(
                "Hotkeys must use distinct keys (copy '{}', restore '{}', exit '{}')",
                copy, restore, exit
            )));
        }
        Ok(Self {
            copy,
            restore,
            exit,
            armed: false,
        })
    }

    /// 从配置中的三个热键字符串构建映射
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let key = |name: &str, value: &str| {
            trigger_key(value).ok_or_else(|| {
                RewindError::Config(format!("Unsupported {} hotkey: {:?}", name, value))
            })
        };
        Self::new(
            key("copy", &config.copy_hotkey)?,
            key("restore", &config.restore_hotkey)?,
            key("exit", &config.exit_hotkey)?,
        )
    }

    pub fn copy_key(&self) -> char {
        self.copy
    }

    pub fn restore_key(&self) -> char {
        self.restore
    }

    pub fn exit_key(&self) -> char {
        self.exit
    }

    /// 是否正在等待恢复编号
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// 处理一次按键
    pub fn press(&mut self, key: char) -> Option<Action> {
        let key = key.to_ascii_lowercase();

        if self.armed {
            self.armed = false;
            if let Some(n) = key.to_digit(10).filter(|n| (1..=9).contains(n)) {
                return Some(Action::Restore(n as usize));
            }
        }

        if key == self.copy {
            Some(Action::Snapshot)
        } else if key == self.exit {
            Some(Action::Exit)
        } else if key == self.restore {
            self.armed = true;
            None
        } else {
            None
        }
    }
}
