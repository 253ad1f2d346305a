// Rewind - 交互式终端界面模块
// 提供配置创建、备份选择以及按键监听循环

use anyhow::{bail, Context, Result};
use console::{style, Key, Term};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::Path;

use crate::config::AppConfig;
use crate::engine::Engine;
use crate::error::RewindError;
use crate::hotkey::{Action, KeyMap};
use crate::progress::ProgressBarSink;
use crate::store::BackupEntry;
use crate::utils::{format_duration, shorten_path};

/// 打印程序标题
pub fn print_banner() {
    println!(
        "{}",
        style(format!("Rewind Save Snapshot Tool v{}", env!("CARGO_PKG_VERSION")))
            .cyan()
            .bold()
    );
    println!("{}", style("----------------------------------------").dim());
}

/// 交互式创建配置文件
///
/// 引导用户输入存档目录、备份目录、游戏可执行文件和提示音开关，
/// 并保存到 `path`。
pub fn create_config(path: &Path) -> Result<AppConfig> {
    let theme = ColorfulTheme::default();

    let src_path: String = Input::with_theme(&theme)
        .with_prompt("Save Folder Path")
        .interact_text()?;

    let dst_dir: String = Input::with_theme(&theme)
        .with_prompt("Backup Root Path")
        .interact_text()?;

    let guard: String = Input::with_theme(&theme)
        .with_prompt("Game Executable (blank to skip the running check)")
        .allow_empty(true)
        .interact_text()?;

    let alert_enabled = Confirm::with_theme(&theme)
        .with_prompt("Play alert sounds?")
        .default(true)
        .interact()?;

    let mut config = AppConfig::new(src_path, dst_dir);
    config.guard_exe_path = Some(guard).filter(|g| !g.trim().is_empty());
    config.alert_enabled = alert_enabled;

    config.save(path)?;
    println!("{} Config saved to {:?}", style("Success:").green(), path);
    Ok(config)
}

/// 格式化单个备份用于列表显示
pub fn describe_entry(index: usize, entry: &BackupEntry) -> String {
    format!(
        "[{}] {}  ({})",
        index,
        entry.name(),
        entry.created_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// 打印当前备份列表
pub fn print_backups(engine: &Engine) {
    let backups = engine.backups();
    if backups.is_empty() {
        println!("{}", style("No backups yet.").yellow());
        return;
    }
    for (i, entry) in backups.iter().enumerate() {
        println!("{}", describe_entry(i + 1, entry));
    }
}

/// 从列表中选择要恢复的备份
///
/// # 返回
/// * `Ok(Some(index))` - 选择的备份编号（1 起始）
/// * `Ok(None)` - 用户取消或没有备份
pub fn select_backup(engine: &Engine) -> Result<Option<usize>> {
    let backups = engine.backups();
    if backups.is_empty() {
        println!("{}", style("No backups available to restore.").yellow());
        return Ok(None);
    }

    let mut choices: Vec<String> = backups
        .iter()
        .enumerate()
        .map(|(i, e)| describe_entry(i + 1, e))
        .collect();
    choices.push(">> Cancel".to_string());

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a backup to RESTORE")
        .default(0)
        .items(&choices)
        .interact()?;

    if selection == backups.len() {
        println!("Operation cancelled.");
        return Ok(None);
    }
    Ok(Some(selection + 1))
}

/// 执行一次快照并打印结果
pub fn run_snapshot(engine: &Engine) -> crate::error::Result<BackupEntry> {
    let entry = engine.request_snapshot()?;
    println!(
        "{} Folder copied to {}",
        style("Snapshot:").green().bold(),
        style(shorten_path(&entry.path)).blue()
    );
    Ok(entry)
}

/// 执行一次恢复并打印结果
pub fn run_restore(engine: &Engine, index: usize) -> crate::error::Result<()> {
    let mut sink = ProgressBarSink::new();
    match engine.request_restore(index, &mut sink) {
        Ok(summary) => {
            println!(
                "{} {} files restored to {} in {}",
                style("Restore:").green().bold(),
                summary.files_copied,
                style(shorten_path(&summary.target)).blue(),
                format_duration(summary.elapsed)
            );
            if summary.skipped_deletions > 0 {
                println!(
                    "{} {} old entries could not be removed before restoring",
                    style("Warning:").yellow(),
                    summary.skipped_deletions
                );
            }
            Ok(())
        }
        Err(RewindError::TargetInUse(exe)) => {
            println!(
                "{} {:?} is running. Aborting restore.",
                style("Blocked:").red().bold(),
                exe
            );
            Err(RewindError::TargetInUse(exe))
        }
        Err(e) => Err(e),
    }
}

/// 按键监听循环
///
/// 从终端逐个读取按键并分发：快照键、恢复键 + 数字、退出键（或 Esc）。
/// 单次操作失败只打印错误，循环继续。
pub fn run_watch(engine: &Engine, mut keys: KeyMap) -> Result<()> {
    let term = Term::stdout();
    if !term.is_term() {
        bail!("The watch mode needs an interactive terminal");
    }

    let settings = engine.settings();
    println!(
        "Watching {} (backups in {})",
        style(shorten_path(&settings.src_path)).blue(),
        style(shorten_path(&settings.dst_dir)).blue()
    );
    println!("Press {} to snapshot the save folder.", style(keys.copy_key()).bold());
    println!(
        "Press {} then [1-9] to restore a specific backup.",
        style(keys.restore_key()).bold()
    );
    println!("Press {} or Esc to exit.", style(keys.exit_key()).bold());

    loop {
        let key = term.read_key().context("Failed to read key")?;
        let action = match key {
            Key::Char(c) => keys.press(c),
            Key::Escape | Key::CtrlC => Some(Action::Exit),
            _ => None,
        };

        let result = match action {
            Some(Action::Snapshot) => run_snapshot(engine).map(|_| ()),
            Some(Action::Restore(index)) => run_restore(engine, index),
            Some(Action::Exit) => {
                println!("Exit key pressed.");
                return Ok(());
            }
            None => Ok(()),
        };

        if let Err(e) = result {
            eprintln!("{} {}", style("Error:").red(), e);
        }
    }
}
