// Rewind - 配置管理模块
// 负责查找、加载和保存 TOML 配置文件，并转换为引擎设置

use crate::engine::EngineSettings;
use crate::error::RewindError;
use crate::paths::{expand_env, validate_readable};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// 应用程序配置
///
/// 路径字段保存原始字符串，可以包含环境变量引用，
/// 在 [`AppConfig::engine_settings`] 中展开。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// 存档源目录
    #[serde(default)]
    pub src_path: String,

    /// 备份根目录
    #[serde(default)]
    pub dst_dir: String,

    /// 快照热键
    #[serde(default = "default_copy_hotkey")]
    pub copy_hotkey: String,

    /// 退出热键
    #[serde(default = "default_exit_hotkey")]
    pub exit_hotkey: String,

    /// 恢复热键前缀，后接数字 1-9
    #[serde(default = "default_restore_hotkey")]
    pub restore_hotkey: String,

    /// 恢复前需要确认未运行的游戏可执行文件
    #[serde(default, alias = "noita_path", skip_serializing_if = "Option::is_none")]
    pub guard_exe_path: Option<String>,

    /// 是否启用提示音，接受布尔值或 "on"/"off"
    #[serde(
        default = "default_alert",
        alias = "alert",
        deserialize_with = "deserialize_toggle"
    )]
    pub alert_enabled: bool,
}

fn default_copy_hotkey() -> String {
    "ctrl+shift+x".to_string()
}

fn default_exit_hotkey() -> String {
    "ctrl+shift+q".to_string()
}

fn default_restore_hotkey() -> String {
    "shift+v".to_string()
}

fn default_alert() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Toggle {
    Bool(bool),
    Text(String),
}

fn deserialize_toggle<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Toggle::deserialize(deserializer)? {
        Toggle::Bool(b) => Ok(b),
        Toggle::Text(s) => match s.trim().to_lowercase().as_str() {
            "on" | "true" | "yes" => Ok(true),
            "off" | "false" | "no" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected \"on\" or \"off\", got {:?}",
                other
            ))),
        },
    }
}

impl AppConfig {
    /// 用源目录和备份目录创建配置，其余字段取默认值
    pub fn new(src_path: impl Into<String>, dst_dir: impl Into<String>) -> Self {
        Self {
            src_path: src_path.into(),
            dst_dir: dst_dir.into(),
            copy_hotkey: default_copy_hotkey(),
            exit_hotkey: default_exit_hotkey(),
            restore_hotkey: default_restore_hotkey(),
            guard_exe_path: None,
            alert_enabled: default_alert(),
        }
    }

    /// 查找配置文件路径
    ///
    /// 查找顺序：
    /// 1. 命令行显式指定的路径
    /// 2. 可执行文件同目录下的 `config.toml`
    /// 3. 平台标准配置目录：
    ///    - Windows: `C:\Users\<用户>\AppData\Roaming\rewind\config\config.toml`
    ///    - macOS: `~/Library/Application Support/rewind/config.toml`
    ///    - Linux: `~/.config/rewind/config.toml`
    pub fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if let Some(beside_exe) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        {
            if beside_exe.is_file() {
                return Ok(beside_exe);
            }
        }

        let proj_dirs =
            ProjectDirs::from("", "", "rewind").context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 从文件加载配置
    ///
    /// # 返回
    /// * `Ok(AppConfig)` - 加载的配置
    /// * `Err(anyhow::Error)` - 文件不存在或解析失败
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Config file not found at {:?}", path))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// 保存配置到文件，父目录不存在时自动创建
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")
    }

    /// 展开环境变量并校验，得到引擎设置
    ///
    /// 配置了保护进程路径时，要求该文件存在且可读。
    /// 备份目录不能等于存档目录或位于其内部，否则快照会复制自身，
    /// 恢复时清理目标会连同备份一起删除。
    pub fn engine_settings(&self) -> crate::error::Result<EngineSettings> {
        let src_path = expand_env(self.src_path.trim());
        let dst_dir = expand_env(self.dst_dir.trim());

        if src_path.is_empty() || dst_dir.is_empty() {
            return Err(RewindError::Config(
                "Source path or destination directory is not specified in the config file"
                    .to_string(),
            ));
        }

        let src_clean = path_clean::clean(&src_path);
        let dst_clean = path_clean::clean(&dst_dir);
        if dst_clean.starts_with(&src_clean) {
            return Err(RewindError::Config(format!(
                "Backup directory {:?} must not be inside the save folder {:?}",
                dst_clean, src_clean
            )));
        }

        let guard_exe_path = match self.guard_exe_path.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let exe = PathBuf::from(expand_env(raw));
                validate_readable(&exe)?;
                if !exe.is_file() {
                    return Err(RewindError::NotFound(exe));
                }
                Some(exe)
            }
            _ => None,
        };

        Ok(EngineSettings {
            src_path: PathBuf::from(src_path),
            dst_dir: PathBuf::from(dst_dir),
            guard_exe_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            src_path = "/games/save00"
            dst_dir = "/games/backups"
            "#,
        )
        .unwrap();

        assert_eq!(cfg, AppConfig::new("/games/save00", "/games/backups"));
        assert!(cfg.alert_enabled);
        assert_eq!(cfg.restore_hotkey, "shift+v");
    }

    #[test]
    fn accepts_legacy_keys_and_on_off_alert() {
        let cfg: AppConfig = toml::from_str(
            r#"
            src_path = "/games/save00"
            dst_dir = "/games/backups"
            noita_path = "/games/noita.exe"
            alert = "off"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.guard_exe_path.as_deref(), Some("/games/noita.exe"));
        assert!(!cfg.alert_enabled);

        let bad = toml::from_str::<AppConfig>(
            r#"
            src_path = "a"
            dst_dir = "b"
            alert = "loud"
            "#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn settings_expand_env_and_require_paths() {
        std::env::set_var("REWIND_CFG_ROOT", "/srv/game");
        let cfg = AppConfig::new("$REWIND_CFG_ROOT/save00", "${REWIND_CFG_ROOT}/backups");
        let settings = cfg.engine_settings().unwrap();
        assert_eq!(settings.src_path, PathBuf::from("/srv/game/save00"));
        assert_eq!(settings.dst_dir, PathBuf::from("/srv/game/backups"));
        assert!(settings.guard_exe_path.is_none());

        let empty = AppConfig::new("", "/b");
        assert!(matches!(empty.engine_settings(), Err(RewindError::Config(_))));
    }

    #[test]
    fn backup_root_inside_save_folder_is_rejected() {
        for dst in ["/games/save00", "/games/save00/", "/games/save00/backups", "/games/./save00/b"] {
            let cfg = AppConfig::new("/games/save00", dst);
            assert!(
                matches!(cfg.engine_settings(), Err(RewindError::Config(_))),
                "{dst} should be rejected"
            );
        }

        // 同前缀的兄弟目录不受影响
        let sibling = AppConfig::new("/games/save00", "/games/save00_backups");
        assert!(sibling.engine_settings().is_ok());
    }

    #[test]
    fn guard_executable_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::new("/a/save00", "/a/backups");

        cfg.guard_exe_path = Some(dir.path().join("noita.exe").to_string_lossy().to_string());
        assert!(matches!(cfg.engine_settings(), Err(RewindError::NotFound(_))));

        fs::write(dir.path().join("noita.exe"), b"MZ").unwrap();
        let settings = cfg.engine_settings().unwrap();
        assert_eq!(settings.guard_exe_path, Some(dir.path().join("noita.exe")));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = AppConfig::new("/a/save00", "/a/backups");
        cfg.alert_enabled = false;

        cfg.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), cfg);
        assert!(AppConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
