// 该文件是 Zhilu （指路） 项目的一部分。
// tests/drive_loop.rs - 主循环集成测试
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
  cell::{Cell, RefCell},
  rc::Rc,
};

use image::{Rgb, RgbImage};

use zhilu::{
  action::Command,
  actuator::Actuator,
  cancel::CancelSignal,
  config::DriveConfig,
  frame::{AsNhwcFrame, ClassifierInput, Frame},
  model::{Catalog, Model, Probabilities},
  output::{Overlay, Render},
  task::{ContinuousTask, OneShotTask, StopReason, Task},
};

const LABELS: [&str; 4] = ["Speed limit (30km/h)", "Stop", "Turn left ahead", "Turn right ahead"];
const PEAK_STOP: [f32; 4] = [0.05, 0.9, 0.03, 0.02];
const PEAK_LEFT: [f32; 4] = [0.1, 0.1, 0.7, 0.1];

fn config() -> DriveConfig {
  DriveConfig::new(Catalog::from_labels(LABELS).unwrap(), 0.33).unwrap()
}

/// 灰色背景上一个黑色矩形
fn sign_frame(index: u64) -> Frame {
  let image = RgbImage::from_fn(160, 120, |x, y| {
    if (40..100).contains(&x) && (30..80).contains(&y) {
      Rgb([0, 0, 0])
    } else {
      Rgb([128, 128, 128])
    }
  });
  Frame::new(index, image)
}

fn blank_frame(index: u64) -> Frame {
  Frame::new(index, RgbImage::from_pixel(160, 120, Rgb([128, 128, 128])))
}

fn sign_frames(n: u64) -> Vec<Frame> {
  (0..n).map(sign_frame).collect()
}

struct StubModel {
  result: Result<Vec<f32>, String>,
  calls: Cell<u32>,
}

impl StubModel {
  fn peaking(probabilities: [f32; 4]) -> Self {
    Self {
      result: Ok(probabilities.to_vec()),
      calls: Cell::new(0),
    }
  }

  fn failing() -> Self {
    Self {
      result: Err("npu timeout".to_string()),
      calls: Cell::new(0),
    }
  }
}

impl Model for &StubModel {
  type Input = ClassifierInput;
  type Output = Probabilities;
  type Error = String;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    assert_eq!(input.as_nhwc().len(), 32 * 32 * 3);
    self.calls.set(self.calls.get() + 1);
    self.result.clone().map(Vec::into_boxed_slice)
  }
}

#[derive(Default)]
struct RecordingActuator {
  calls: Vec<Command>,
  fail_on: Option<Command>,
  cancel_on_command: Option<CancelSignal>,
}

impl Actuator for RecordingActuator {
  type Error = String;

  fn stop(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::Stop)
  }

  fn left(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::TurnLeft)
  }

  fn right(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::TurnRight)
  }

  fn forward(&mut self) -> Result<(), Self::Error> {
    self.execute(Command::Forward)
  }

  fn execute(&mut self, command: Command) -> Result<(), Self::Error> {
    self.calls.push(command);
    if let Some(signal) = &self.cancel_on_command {
      signal.cancel();
    }
    if self.fail_on == Some(command) {
      return Err(format!("motor refused {}", command));
    }
    Ok(())
  }
}

#[derive(Default)]
struct Screen {
  shown: Rc<RefCell<Vec<String>>>,
  drops: Rc<Cell<u32>>,
  fail: bool,
}

impl Screen {
  fn failing() -> Self {
    Self {
      shown: Rc::default(),
      drops: Rc::default(),
      fail: true,
    }
  }
}

impl Render<RgbImage, Overlay> for Screen {
  type Error = String;

  fn render_result(&self, frame: &RgbImage, result: &Overlay) -> Result<(), Self::Error> {
    if self.fail {
      return Err("display lost".to_string());
    }
    assert_eq!(frame.dimensions(), (160, 120));
    self.shown.borrow_mut().push(format!(
      "{} {} {}",
      result.frame_index,
      result.prediction.overlay_text(),
      result.command
    ));
    Ok(())
  }
}

impl Drop for Screen {
  fn drop(&mut self) {
    self.drops.set(self.drops.get() + 1);
  }
}

struct Source {
  frames: std::vec::IntoIter<Frame>,
  drops: Rc<Cell<u32>>,
}

impl Source {
  fn new(frames: Vec<Frame>) -> Self {
    Self {
      frames: frames.into_iter(),
      drops: Rc::default(),
    }
  }
}

impl Iterator for Source {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frames.next()
  }
}

impl Drop for Source {
  fn drop(&mut self) {
    self.drops.set(self.drops.get() + 1);
  }
}

#[test]
fn stop_sign_issues_exactly_one_stop() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let mut actuator = RecordingActuator::default();
  let screen = Screen::default();
  let shown = Rc::clone(&screen.shown);

  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .run_task(sign_frames(1).into_iter(), &model, &mut actuator, screen)
    .unwrap();

  assert_eq!(actuator.calls, [Command::Stop]);
  assert_eq!(summary.frames, 1);
  assert_eq!(summary.actuated, 1);
  assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
  assert_eq!(summary.last_command, Some(Command::Stop));
  assert_eq!(shown.borrow().as_slice(), ["0 Stop 90.00% stop"]);
}

#[test]
fn frame_without_contour_is_skipped() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let mut actuator = RecordingActuator::default();
  let screen = Screen::default();
  let shown = Rc::clone(&screen.shown);

  let frames = vec![blank_frame(0), sign_frame(1)];
  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .run_task(frames.into_iter(), &model, &mut actuator, screen)
    .unwrap();

  assert_eq!(model.calls.get(), 1);
  assert_eq!(actuator.calls, [Command::Stop]);
  assert_eq!(summary.frames, 2);
  assert_eq!(summary.skipped_no_roi, 1);
  assert_eq!(summary.skipped(), 1);
  assert_eq!(shown.borrow().len(), 1);
  assert!(shown.borrow()[0].starts_with("1 "));
}

#[test]
fn cancellation_waits_for_in_flight_actuation() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let cancel = CancelSignal::new();
  let mut actuator = RecordingActuator {
    cancel_on_command: Some(cancel.clone()),
    ..Default::default()
  };
  let screen = Screen::default();
  let shown = Rc::clone(&screen.shown);

  let summary = ContinuousTask::new(&config, cancel)
    .run_task(sign_frames(3).into_iter(), &model, &mut actuator, screen)
    .unwrap();

  assert_eq!(actuator.calls, [Command::Stop]);
  assert_eq!(shown.borrow().len(), 1);
  assert_eq!(summary.frames, 1);
  assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
}

#[test]
fn early_cancel_still_finishes_first_iteration() {
  let config = config();
  let model = StubModel::peaking(PEAK_LEFT);
  let cancel = CancelSignal::new();
  cancel.cancel();
  let mut actuator = RecordingActuator::default();

  let summary = ContinuousTask::new(&config, cancel)
    .run_task(sign_frames(3).into_iter(), &model, &mut actuator, Screen::default())
    .unwrap();

  assert_eq!(actuator.calls, [Command::TurnLeft]);
  assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
}

#[test]
fn frame_number_limits_the_run() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let mut actuator = RecordingActuator::default();

  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .with_frame_number(Some(2))
    .run_task(sign_frames(5).into_iter(), &model, &mut actuator, Screen::default())
    .unwrap();

  assert_eq!(summary.frames, 2);
  assert_eq!(actuator.calls.len(), 2);
  assert_eq!(summary.stop_reason, Some(StopReason::FrameLimit));
}

#[test]
fn render_failure_does_not_stop_the_loop() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let mut actuator = RecordingActuator::default();
  let screen = Screen::failing();

  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .run_task(sign_frames(3).into_iter(), &model, &mut actuator, screen)
    .unwrap();

  assert_eq!(actuator.calls, [Command::Stop; 3]);
  assert_eq!(summary.render_faults, 3);
  assert_eq!(summary.actuated, 3);
  assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
}

#[test]
fn actuator_fault_falls_back_to_stop() {
  let config = config();
  let model = StubModel::peaking(PEAK_LEFT);
  let mut actuator = RecordingActuator {
    fail_on: Some(Command::TurnLeft),
    ..Default::default()
  };

  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .run_task(sign_frames(2).into_iter(), &model, &mut actuator, Screen::default())
    .unwrap();

  assert_eq!(
    actuator.calls,
    [
      Command::TurnLeft,
      Command::Stop,
      Command::TurnLeft,
      Command::Stop
    ]
  );
  assert_eq!(summary.actuator_faults, 2);
  assert_eq!(summary.frames, 2);
}

#[test]
fn inference_failure_skips_the_frame() {
  let config = config();
  let model = StubModel::failing();
  let mut actuator = RecordingActuator::default();
  let screen = Screen::default();
  let shown = Rc::clone(&screen.shown);

  let summary = ContinuousTask::new(&config, CancelSignal::new())
    .run_task(sign_frames(2).into_iter(), &model, &mut actuator, screen)
    .unwrap();

  assert!(actuator.calls.is_empty());
  assert!(shown.borrow().is_empty());
  assert_eq!(summary.skipped_classify, 2);
  assert_eq!(summary.actuated, 0);
}

#[test]
fn source_and_output_are_released_once() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);
  let source = Source::new(sign_frames(2));
  let source_drops = Rc::clone(&source.drops);
  let screen = Screen::default();
  let screen_drops = Rc::clone(&screen.drops);

  ContinuousTask::new(&config, CancelSignal::new())
    .run_task(source, &model, RecordingActuator::default(), screen)
    .unwrap();

  assert_eq!(source_drops.get(), 1);
  assert_eq!(screen_drops.get(), 1);
}

#[test]
fn one_shot_uses_only_the_first_frame() {
  let config = config();
  let model = StubModel::peaking(PEAK_LEFT);
  let mut actuator = RecordingActuator::default();

  let summary = OneShotTask::new(&config)
    .run_task(sign_frames(3).into_iter(), &model, &mut actuator, Screen::default())
    .unwrap();

  assert_eq!(model.calls.get(), 1);
  assert_eq!(actuator.calls, [Command::TurnLeft]);
  assert_eq!(summary.last_prediction.map(|p| p.label), Some("Turn left ahead".to_string()));
  assert_eq!(summary.stop_reason, Some(StopReason::FrameLimit));
}

#[test]
fn one_shot_without_frames_is_an_error() {
  let config = config();
  let model = StubModel::peaking(PEAK_STOP);

  let result = OneShotTask::new(&config).run_task(
    Vec::<Frame>::new().into_iter(),
    &model,
    RecordingActuator::default(),
    Screen::default(),
  );
  assert!(result.is_err());
}
