// 该文件是 Zhilu （指路） 项目的一部分。
// src/cancel.rs - 退出信号
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  io::BufRead,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use tracing::{info, warn};

/// 收到中断信号后，等待主循环自行退出的最长时间
pub const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 退出键：在控制终端输入 `q` 后回车
pub const QUIT_KEY: &str = "q";

/// 协作式退出信号，主循环每轮检查一次
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
  flag: Arc<AtomicBool>,
}

impl CancelSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Release);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Acquire)
  }

  /// Ctrl-C 置位退出信号；若主循环卡在取帧上，超时后强制退出进程
  pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
    let signal = self.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      signal.cancel();
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }

  /// 在后台读取标准输入，遇到退出键时置位
  pub fn watch_stdin(&self) {
    let signal = self.clone();
    let spawned = thread::Builder::new()
      .name("quit-key".to_string())
      .spawn(move || watch_lines(std::io::stdin().lock(), &signal));
    if let Err(e) = spawned {
      warn!("无法监听退出键: {}", e);
    }
  }
}

fn watch_lines<R: BufRead>(reader: R, signal: &CancelSignal) {
  for line in reader.lines() {
    let Ok(line) = line else {
      break;
    };
    if line.trim() == QUIT_KEY {
      info!("收到退出键");
      signal.cancel();
      break;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn clones_share_the_flag() {
    let signal = CancelSignal::new();
    let observer = signal.clone();
    assert!(!observer.is_cancelled());
    signal.cancel();
    assert!(observer.is_cancelled());
  }

  #[test]
  fn quit_key_sets_the_flag() {
    let signal = CancelSignal::new();
    watch_lines(Cursor::new("w\n  q \nignored\n"), &signal);
    assert!(signal.is_cancelled());
  }

  #[test]
  fn other_input_is_ignored() {
    let signal = CancelSignal::new();
    watch_lines(Cursor::new("quit\nQ\n"), &signal);
    assert!(!signal.is_cancelled());
  }
}
