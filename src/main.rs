// Rewind - 存档快照与恢复工具
//
// 主程序入口，负责命令行参数解析、配置加载和日志初始化
//
// 功能特性：
// - 快照：将存档目录完整复制为带时间戳的新文件夹
// - 轮换：内存中保留最近 9 个备份，按编号 1-9 恢复
// - 保护：游戏进程运行时拒绝恢复
// - 按键监听：在终端中用快捷键触发快照和恢复

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rewind::alert::TerminalBell;
use rewind::cli::{
    create_config, print_backups, print_banner, run_restore, run_snapshot, run_watch,
    select_backup,
};
use rewind::config::AppConfig;
use rewind::engine::Engine;
use rewind::hotkey::KeyMap;
use rewind::process::SystemProcesses;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// 子命令枚举
#[derive(Subcommand, Debug)]
enum Commands {
    /// 监听按键，触发快照和恢复（默认）
    Watch,

    /// 立即对存档目录做一次快照
    Snapshot,

    /// 恢复指定编号的备份，不指定时从列表中选择
    Restore {
        /// 备份编号（1 为最新）
        #[arg(value_name = "INDEX")]
        index: Option<usize>,
    },

    /// 列出当前的备份
    List,

    /// 交互式创建配置文件
    Init,
}

/// 命令行参数结构体
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,

    /// 配置文件路径
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// 程序入口
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = AppConfig::discover(args.config.as_deref())?;
    debug!(path = %config_path.display(), "Using config file");

    let command = args.command.unwrap_or(Commands::Watch);
    if matches!(command, Commands::Init) {
        print_banner();
        create_config(&config_path)?;
        return Ok(());
    }

    let config = load_config(&config_path)?;
    let engine = open_engine(&config)?;

    match command {
        Commands::Watch => {
            print_banner();
            let keys = KeyMap::from_config(&config)?;
            run_watch(&engine, keys)?;
        }
        Commands::Snapshot => {
            run_snapshot(&engine)?;
        }
        Commands::Restore { index } => {
            let index = match index {
                Some(i) => Some(i),
                None => select_backup(&engine)?,
            };
            if let Some(index) = index {
                run_restore(&engine, index)?;
            }
        }
        Commands::List => print_backups(&engine),
        Commands::Init => {}
    }

    Ok(())
}

/// 初始化日志输出到 stderr，`RUST_LOG` 优先
fn init_logging(verbose: bool) {
    let default = if verbose { "rewind=debug" } else { "rewind=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 加载配置文件，不存在时提示运行 init
fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        eprintln!(
            "{} No config file at {:?}. Run `rewind init` to create one.",
            style("Error:").red(),
            path
        );
    }
    AppConfig::load(path)
}

/// 根据配置创建引擎并加载已有备份
fn open_engine(config: &AppConfig) -> Result<Engine> {
    let settings = config.engine_settings().context("Invalid configuration")?;
    if let Some(exe) = &settings.guard_exe_path {
        debug!(exe = %exe.display(), "Guard executable verified");
    }

    let engine = Engine::open(settings)
        .context("Failed to open backup directory")?
        .with_guard(Box::new(SystemProcesses))
        .with_alerts(Box::new(TerminalBell::new(config.alert_enabled)));
    Ok(engine)
}
