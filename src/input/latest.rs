// 该文件是 Zhilu （指路） 项目的一部分。
// src/input/latest.rs - 后台采集，只保留最新一帧
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
  sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::frame::Frame;

#[derive(Default)]
struct Slot {
  frame: Option<Frame>,
  closed: bool,
}

#[derive(Default)]
struct Shared {
  slot: Mutex<Slot>,
  ready: Condvar,
  stop: AtomicBool,
}

/// 在后台线程中读取输入源，消费者每次拿到的都是最新一帧。
///
/// 槽位只有一个，新帧直接覆盖旧帧；输入源结束后，最后一帧仍会被交付一次，
/// 之后 `next` 返回 `None`。输入源在采集线程中释放。
pub struct LatestFrameInput {
  shared: Arc<Shared>,
  handle: Option<JoinHandle<()>>,
}

impl LatestFrameInput {
  pub fn spawn<I>(source: I) -> Self
  where
    I: Iterator<Item = Frame> + Send + 'static,
  {
    let shared = Arc::new(Shared::default());
    let producer = Arc::clone(&shared);

    let handle = thread::Builder::new()
      .name("frame-capture".to_string())
      .spawn(move || capture(source, &producer))
      .map_err(|e| warn!("无法启动采集线程: {}", e))
      .ok();

    if handle.is_none() {
      // 线程没有启动就不会有帧
      if let Ok(mut slot) = shared.slot.lock() {
        slot.closed = true;
      }
    }

    Self { shared, handle }
  }
}

fn capture<I: Iterator<Item = Frame>>(source: I, shared: &Shared) {
  info!("采集线程启动");
  let mut dropped = 0u64;
  for frame in source {
    if shared.stop.load(Ordering::Acquire) {
      break;
    }
    let Ok(mut slot) = shared.slot.lock() else {
      break;
    };
    if slot.frame.replace(frame).is_some() {
      dropped += 1;
    }
    shared.ready.notify_one();
  }

  if let Ok(mut slot) = shared.slot.lock() {
    slot.closed = true;
  }
  shared.ready.notify_all();
  info!("采集线程退出，覆盖丢弃 {} 帧", dropped);
}

impl Iterator for LatestFrameInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let mut slot = self.shared.slot.lock().ok()?;
    loop {
      if let Some(frame) = slot.frame.take() {
        debug!("取得最新帧 {}", frame.index);
        return Some(frame);
      }
      if slot.closed {
        return None;
      }
      slot = self.shared.ready.wait(slot).ok()?;
    }
  }
}

impl Drop for LatestFrameInput {
  fn drop(&mut self) {
    self.shared.stop.store(true, Ordering::Release);
    // 采集线程可能阻塞在硬件读取上，只在它已经结束时回收
    if let Some(handle) = self.handle.take()
      && handle.is_finished()
      && handle.join().is_err()
    {
      warn!("采集线程异常退出");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::sync::mpsc;

  fn frames(n: u64) -> impl Iterator<Item = Frame> + Send + 'static {
    (0..n).map(|i| Frame::new(i, RgbImage::new(2, 2)))
  }

  #[test]
  fn last_frame_is_delivered_before_end() {
    let input = LatestFrameInput::spawn(frames(5));
    let indices: Vec<u64> = input.map(|f| f.index).collect();
    assert_eq!(indices.last(), Some(&4));
    assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");
  }

  #[test]
  fn slow_consumer_only_sees_newest_frame() {
    let (tx, rx) = mpsc::channel::<()>();
    // 先产生三帧，等待消费者通知后才结束
    let source = frames(3).chain(std::iter::from_fn(move || {
      let _ = rx.recv();
      None
    }));
    let mut input = LatestFrameInput::spawn(source);

    // 等到最后一帧写入槽位
    loop {
      let slot = input.shared.slot.lock().unwrap();
      if slot.frame.as_ref().is_some_and(|f| f.index == 2) {
        break;
      }
      drop(slot);
      thread::yield_now();
    }

    assert_eq!(input.next().map(|f| f.index), Some(2));
    tx.send(()).unwrap();
    assert!(input.next().is_none());
  }

  #[test]
  fn empty_source_ends_immediately() {
    let mut input = LatestFrameInput::spawn(frames(0));
    assert!(input.next().is_none());
  }
}
