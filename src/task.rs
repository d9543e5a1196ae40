// 该文件是 Zhilu （指路） 项目的一部分。
// src/task.rs - 感知到执行的主循环
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

//! # 主循环
//!
//! 每一轮：取帧 → 提取 ROI → 缩放 → 分类 → 映射指令 → 执行 → 渲染 → 检查退出信号。
//! 单帧失败（找不到轮廓、ROI 退化、推理失败）只跳过本轮；
//! 退出信号在本轮执行之后才检查，已经发出的指令不会被打断。
//!
//! 输入源和输出由任务持有，任务结束时各释放一次。

use std::{fmt::Display, time::Instant};

use image::RgbImage;
use imageproc::point::Point;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  action::Command,
  actuator::Actuator,
  cancel::CancelSignal,
  config::DriveConfig,
  frame::{ClassifierInput, Frame},
  model::{ClassifyError, Model, Prediction, Probabilities, SignClassifier},
  output::{Overlay, Render},
  roi::{Extraction, RoiError, resize_roi},
};

pub trait Task<I, M, A, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, actuator: A, output: O) -> Result<DriveSummary, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  SourceExhausted,
  Cancelled,
  FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Running,
  Stopped(StopReason),
}

/// 单帧处理失败，本轮跳过
#[derive(Error, Debug)]
pub enum FrameError<E> {
  #[error("ROI 提取失败: {0}")]
  Roi(#[from] RoiError),
  #[error("分类失败: {0}")]
  Classify(#[from] ClassifyError<E>),
}

/// 一帧的感知结果
#[derive(Debug, Clone)]
pub struct Perception {
  pub extraction: Extraction,
  pub prediction: Prediction,
  pub command: Command,
}

impl Perception {
  pub fn top_left(&self) -> Point<i32> {
    self.extraction.top_left
  }

  pub fn overlay(&self, frame_index: u64) -> Overlay {
    Overlay {
      prediction: self.prediction.clone(),
      command: self.command,
      top_left: self.extraction.top_left,
      corners: self.extraction.corners,
      frame_index,
    }
  }
}

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveSummary {
  pub frames: u64,
  pub actuated: u64,
  pub skipped_no_roi: u64,
  pub skipped_classify: u64,
  pub actuator_faults: u64,
  pub render_faults: u64,
  pub last_prediction: Option<Prediction>,
  pub last_command: Option<Command>,
  pub stop_reason: Option<StopReason>,
}

impl DriveSummary {
  pub fn skipped(&self) -> u64 {
    self.skipped_no_roi + self.skipped_classify
  }

  fn log(&self) {
    info!(
      "共 {} 帧: 执行 {} 帧, 跳过 {} 帧 (无 ROI {}, 分类失败 {}), 执行器故障 {}, 渲染故障 {}, 退出原因 {:?}",
      self.frames,
      self.actuated,
      self.skipped(),
      self.skipped_no_roi,
      self.skipped_classify,
      self.actuator_faults,
      self.render_faults,
      self.stop_reason
    );
  }
}

/// 一帧的感知：提取 ROI、缩放、分类、映射指令
pub fn perceive<M>(
  config: &DriveConfig,
  classifier: &SignClassifier<'_, M>,
  frame: &Frame,
) -> Result<Perception, FrameError<M::Error>>
where
  M: Model<Input = ClassifierInput, Output = Probabilities>,
{
  let extraction = config.extractor.extract(&frame.image)?;
  let input = resize_roi(&extraction.roi)?;
  let prediction = classifier.classify(&input)?;
  let command = prediction.command();
  debug!(
    "帧 {}: {} ({:.2}%) -> {}",
    frame.index, prediction.label, prediction.confidence, command
  );
  Ok(Perception {
    extraction,
    prediction,
    command,
  })
}

/// 感知之后的动作部分：执行指令并渲染叠加层，二者失败都不终止循环
struct Drive<'c, M, A, O> {
  config: &'c DriveConfig,
  classifier: SignClassifier<'c, M>,
  actuator: A,
  output: O,
  summary: DriveSummary,
}

impl<'c, M, A, O> Drive<'c, M, A, O>
where
  M: Model<Input = ClassifierInput, Output = Probabilities>,
  M::Error: Display,
  A: Actuator,
  A::Error: Display,
  O: Render<RgbImage, Overlay>,
  O::Error: Display,
{
  fn new(config: &'c DriveConfig, model: M, actuator: A, output: O) -> Self {
    Self {
      config,
      classifier: SignClassifier::new(model, &config.catalog),
      actuator,
      output,
      summary: DriveSummary::default(),
    }
  }

  fn step(&mut self, frame: &Frame) {
    self.summary.frames += 1;
    let now = Instant::now();

    let perception = match perceive(self.config, &self.classifier, frame) {
      Ok(perception) => perception,
      Err(e) => {
        match &e {
          FrameError::Roi(_) => self.summary.skipped_no_roi += 1,
          FrameError::Classify(_) => self.summary.skipped_classify += 1,
        }
        warn!("跳过第 {} 帧: {}", frame.index, e);
        return;
      }
    };
    let elapsed_a = now.elapsed();

    if let Err(e) = self.actuator.execute_or_stop(perception.command) {
      self.summary.actuator_faults += 1;
      error!("执行 {} 失败，已发出停车指令: {}", perception.command, e);
    }
    self.summary.actuated += 1;

    if let Err(e) = self
      .output
      .render_result(&perception.extraction.annotated, &perception.overlay(frame.index))
    {
      self.summary.render_faults += 1;
      warn!("第 {} 帧渲染失败: {}", frame.index, e);
    }
    let elapsed_b = now.elapsed();

    info!(
      "第 {} 帧: {} {:.2}% -> {}, 耗时: {:.2?} / {:.2?}",
      frame.index,
      perception.prediction.label,
      perception.prediction.confidence,
      perception.command,
      elapsed_a,
      elapsed_b
    );
    self.summary.last_command = Some(perception.command);
    self.summary.last_prediction = Some(perception.prediction);
  }

  fn finish(self, reason: StopReason) -> DriveSummary {
    let Drive {
      actuator,
      output,
      mut summary,
      ..
    } = self;
    drop(output);
    drop(actuator);
    summary.stop_reason = Some(reason);
    summary.log();
    summary
  }
}

/// 只处理第一帧，报告决策
pub struct OneShotTask<'c> {
  config: &'c DriveConfig,
}

impl<'c> OneShotTask<'c> {
  pub fn new(config: &'c DriveConfig) -> Self {
    Self { config }
  }
}

impl<'c, I, M, A, O> Task<I, M, A, O> for OneShotTask<'c>
where
  I: Iterator<Item = Frame>,
  M: Model<Input = ClassifierInput, Output = Probabilities>,
  M::Error: Display,
  A: Actuator,
  A::Error: Display,
  O: Render<RgbImage, Overlay>,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, actuator: A, output: O) -> Result<DriveSummary, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    drop(input);
    info!("输入帧获取成功: {}x{}", frame.width(), frame.height());

    let mut drive = Drive::new(self.config, model, actuator, output);
    drive.step(&frame);
    Ok(drive.finish(StopReason::FrameLimit))
  }
}

/// 持续处理直到输入结束、收到退出信号或达到指定帧数
pub struct ContinuousTask<'c> {
  config: &'c DriveConfig,
  cancel: CancelSignal,
  frame_number: Option<u64>,
}

impl<'c> ContinuousTask<'c> {
  pub fn new(config: &'c DriveConfig, cancel: CancelSignal) -> Self {
    Self {
      config,
      cancel,
      frame_number: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  fn next_state(&self, frames: u64) -> LoopState {
    if self.frame_number.is_some_and(|n| frames >= n) {
      info!("达到指定帧数 {}, 退出任务循环", frames);
      return LoopState::Stopped(StopReason::FrameLimit);
    }
    if self.cancel.is_cancelled() {
      warn!("收到退出信号，退出任务循环");
      return LoopState::Stopped(StopReason::Cancelled);
    }
    LoopState::Running
  }
}

impl<'c, I, M, A, O> Task<I, M, A, O> for ContinuousTask<'c>
where
  I: Iterator<Item = Frame>,
  M: Model<Input = ClassifierInput, Output = Probabilities>,
  M::Error: Display,
  A: Actuator,
  A::Error: Display,
  O: Render<RgbImage, Overlay>,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, actuator: A, output: O) -> Result<DriveSummary, Self::Error> {
    info!("开始任务...");
    let mut drive = Drive::new(self.config, model, actuator, output);

    let reason = if self.frame_number == Some(0) {
      StopReason::FrameLimit
    } else {
      loop {
        let Some(frame) = input.next() else {
          info!("输入结束");
          break StopReason::SourceExhausted;
        };
        drive.step(&frame);
        if let LoopState::Stopped(reason) = self.next_state(drive.summary.frames) {
          break reason;
        }
      }
    };
    drop(input);

    info!("任务完成，退出");
    Ok(drive.finish(reason))
  }
}
