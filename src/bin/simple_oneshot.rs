// 该文件是 Zhilu （指路） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧决策
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
use tracing::{info, warn};
use url::Url;

use zhilu::{
  FromUrl,
  actuator::LogActuator,
  config::DriveConfig,
  input::InputWrapper,
  model::ModelWrapper,
  output::{OutputWrapper, draw::Draw},
  roi::DEFAULT_CANNY_SIGMA,
  task::{OneShotTask, Task},
};

/// 对输入的第一帧做一次识别，打印决策
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 类别表 CSV
  #[arg(long, value_name = "CSV")]
  pub catalog: PathBuf,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "none:")]
  pub output: Url,

  #[arg(long, value_name = "SIGMA", default_value_t = DEFAULT_CANNY_SIGMA)]
  pub sigma: f64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = DriveConfig::load(&args.catalog, args.sigma)?;
  let model = ModelWrapper::from_url(&args.model)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?.with_draw(Draw::default());

  let summary = OneShotTask::new(&config).run_task(input, model, LogActuator::default(), output)?;

  match (&summary.last_prediction, summary.last_command) {
    (Some(prediction), Some(command)) => println!("{} -> {}", prediction.overlay_text(), command),
    _ => warn!("第一帧中没有找到标志"),
  }

  Ok(())
}
