// Rewind - 恢复进度模块
// 恢复时每复制一个文件报告一次进度

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// 恢复进度接收端
///
/// 回调在复制线程中同步调用，实现不应阻塞。
pub trait ProgressSink {
    /// 开始复制，`total` 为预先统计的文件总数
    fn start(&mut self, total: u64);

    /// 完成一个文件的复制
    fn tick(&mut self, rel_path: &Path);

    /// 复制结束（成功或失败都会调用）
    fn finish(&mut self, success: bool);
}

/// 不输出任何进度
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _total: u64) {}
    fn tick(&mut self, _rel_path: &Path) {}
    fn finish(&mut self, _success: bool) {}
}

/// 在终端显示进度条
#[derive(Default)]
pub struct ProgressBarSink {
    bar: Option<ProgressBar>,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ProgressBarSink {
    fn start(&mut self, total: u64) {
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message("Restoring Backup");
        self.bar = Some(bar);
    }

    fn tick(&mut self, _rel_path: &Path) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn finish(&mut self, success: bool) {
        if let Some(bar) = self.bar.take() {
            if success {
                bar.finish_with_message("Restore complete");
            } else {
                bar.abandon_with_message("Restore aborted");
            }
        }
    }
}
