// 该文件是 Zhilu （指路） 项目的一部分。
// src/model/rknn.rs - RKNN 标志分类模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{AsNhwcFrame, ClassifierInput},
  model::{Model, Probabilities, softmax},
};

const CLASSIFIER_NUM_INPUTS: u32 = 1;
const CLASSIFIER_NUM_OUTPUTS: u32 = 1;

pub struct RknnClassifier {
  context: Context,
  softmax: bool,
}

#[derive(Error, Debug)]
pub enum RknnClassifierError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl From<rknpu::Error> for RknnClassifierError {
  fn from(err: rknpu::Error) -> Self {
    RknnClassifierError::RknnError(err)
  }
}

impl RknnClassifierError {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnClassifierError::ModelInvalid(msg.to_string(), e)
  }
}

pub struct RknnClassifierBuilder {
  model_path: String,
  flags: InitFlags,
  softmax: bool,
}

impl FromUrlWithScheme for RknnClassifierBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnClassifierBuilder {
  type Error = RknnClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnClassifierError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    // 模型最后一层不是 softmax 时需要 `?softmax=true`
    let softmax = url
      .query_pairs()
      .any(|(k, v)| k == "softmax" && (v.is_empty() || v == "true" || v == "1"));

    Ok(RknnClassifierBuilder {
      model_path: url.path().to_string(),
      flags: InitFlags::default(),
      softmax,
    })
  }
}

impl RknnClassifierBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build(self) -> Result<RknnClassifier, RknnClassifierError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let context = Context::new(&model_data, self.flags)?;

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnClassifierError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnClassifierError::invalid("无法获取输出数量", e))?;

    if num_inputs != CLASSIFIER_NUM_INPUTS || num_outputs != CLASSIFIER_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        CLASSIFIER_NUM_INPUTS, CLASSIFIER_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(RknnClassifierError::invalid(
        &msg,
        rknpu::Error::InvalidModel,
      ));
    }

    info!("模型加载完成");
    Ok(RknnClassifier {
      context,
      softmax: self.softmax,
    })
  }
}

impl Model for RknnClassifier {
  type Input = ClassifierInput;
  type Output = Probabilities;
  type Error = RknnClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.context.set_input(
      0,
      input.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let scores = output.get_f32(0)?;
    let probabilities = if self.softmax {
      softmax(scores)
    } else {
      scores.to_vec()
    };

    Ok(probabilities.into_boxed_slice())
  }
}
