// 该文件是 Zhilu （指路） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use zhilu::{
  FromUrl,
  actuator::ActuatorWrapper,
  cancel::CancelSignal,
  config::DriveConfig,
  frame::Frame,
  input::{InputWrapper, LatestFrameInput},
  model::ModelWrapper,
  output::{OutputWrapper, draw::Draw},
  roi::DEFAULT_CANNY_SIGMA,
  task::{ContinuousTask, Task},
};

/// Zhilu 交通标志驾驶循环
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型，例如 rknn:///path/model.rknn?softmax=true
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别表 CSV（表头 + 每行一个类别）
  #[arg(long, value_name = "CSV")]
  pub catalog: PathBuf,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 显示输出
  #[arg(long, value_name = "OUTPUT", default_value = "none:")]
  pub output: Url,
  /// 执行器
  #[arg(long, value_name = "ACTUATOR", default_value = "log:")]
  pub actuator: Url,
  /// auto-canny 灵敏度
  #[arg(long, value_name = "SIGMA", default_value_t = DEFAULT_CANNY_SIGMA)]
  pub sigma: f64,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<u64>,
  /// 在后台线程中采集，每轮只处理最新一帧
  #[arg(long)]
  pub latest_frame: bool,
  /// 叠加层文字字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("类别表: {}", args.catalog.display());
  info!("输入来源: {}", args.input);
  info!("输出: {}", args.output);
  info!("执行器: {}", args.actuator);

  let config = DriveConfig::load(&args.catalog, args.sigma)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let actuator = ActuatorWrapper::from_url(&args.actuator)?;
  let draw = match &args.font {
    Some(path) => Draw::with_font_file(path),
    None => Draw::default(),
  };
  let output = OutputWrapper::from_url(&args.output)?.with_draw(draw);
  let input = InputWrapper::from_url(&args.input)?;
  info!("输入源: {}, 执行器: {}", input.kind(), actuator.kind());

  let cancel = CancelSignal::new();
  cancel.install_ctrlc()?;
  cancel.watch_stdin();

  let input: Box<dyn Iterator<Item = Frame>> = if args.latest_frame {
    Box::new(LatestFrameInput::spawn(input))
  } else {
    Box::new(input)
  };

  let summary = ContinuousTask::new(&config, cancel)
    .with_frame_number(args.frame_number)
    .run_task(input, model, actuator, output)?;

  info!(
    "处理 {} 帧, 执行 {} 次, 跳过 {} 帧",
    summary.frames,
    summary.actuated,
    summary.skipped()
  );

  Ok(())
}
