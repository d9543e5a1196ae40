// 该文件是 Zhilu （指路） 项目的一部分。
// src/model.rs - 分类模型与标志类别
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, action::Command, frame::ClassifierInput};

mod catalog;
pub use self::catalog::{Catalog, CatalogError};

#[cfg(feature = "model_rknn")]
mod rknn;
#[cfg(feature = "model_rknn")]
pub use self::rknn::{RknnClassifier, RknnClassifierBuilder, RknnClassifierError};

/// 每个类别的概率，长度与类别表一致
pub type Probabilities = Box<[f32]>;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 一次分类的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
  pub index: usize,
  pub label: String,
  /// 最大概率乘以 100，未经校准
  pub confidence: f32,
}

impl Prediction {
  pub fn command(&self) -> Command {
    Command::from_label(&self.label)
  }

  pub fn overlay_text(&self) -> String {
    format!("{} {:.2}%", self.label, self.confidence)
  }
}

#[derive(Error, Debug)]
pub enum ClassifyError<E> {
  #[error("模型推理错误: {0}")]
  Model(E),
  #[error("概率向量长度不匹配: 类别数 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("概率向量中没有有效值")]
  NoMaximum,
}

/// 最大值下标，相同取值时取第一个，忽略 NaN
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
  values
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best, (idx, value)| match best {
      _ if value.is_nan() => best,
      Some((_, best_value)) if value <= best_value => best,
      _ => Some((idx, value)),
    })
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
  let sum: f32 = exps.iter().sum();
  exps.into_iter().map(|v| v / sum).collect()
}

/// 分类器适配：模型输出的概率向量 + 类别表 = 预测结果
pub struct SignClassifier<'c, M> {
  model: M,
  catalog: &'c Catalog,
}

impl<'c, M> SignClassifier<'c, M>
where
  M: Model<Input = ClassifierInput, Output = Probabilities>,
{
  pub fn new(model: M, catalog: &'c Catalog) -> Self {
    Self { model, catalog }
  }

  pub fn catalog(&self) -> &'c Catalog {
    self.catalog
  }

  pub fn classify(&self, input: &ClassifierInput) -> Result<Prediction, ClassifyError<M::Error>> {
    let probabilities = self.model.infer(input).map_err(ClassifyError::Model)?;
    debug!("模型输出: {:?}", probabilities);
    self.catalog.predict(&probabilities)
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_rknn")]
  #[error("RKNN 模型错误: {0}")]
  RknnClassifierError(#[from] RknnClassifierError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的分类模型后端
pub enum ModelWrapper {
  #[cfg(feature = "model_rknn")]
  Rknn(RknnClassifier),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_rknn")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == RknnClassifierBuilder::SCHEME {
        let model = RknnClassifierBuilder::from_url(url)?.build()?;
        return Ok(ModelWrapper::Rknn(model));
      }
    }
    Err(ModelError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Model for ModelWrapper {
  type Input = ClassifierInput;
  type Output = Probabilities;
  type Error = ModelError;

  #[allow(unused_variables)]
  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match *self {
      #[cfg(feature = "model_rknn")]
      ModelWrapper::Rknn(ref model) => model.infer(input).map_err(ModelError::from),
    }
  }
}
