// 该文件是 Zhilu （指路） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use imageproc::point::Point;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, action::Command, model::Prediction};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

/// 叠加到显示帧上的内容，只用于观察，不参与决策
#[derive(Debug, Clone)]
pub struct Overlay {
  pub prediction: Prediction,
  pub command: Command,
  pub top_left: Point<i32>,
  pub corners: [Point<i32>; 4],
  pub frame_index: u64,
}

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 无显示环境下的空输出
pub struct HeadlessOutput;

impl FromUrlWithScheme for HeadlessOutput {
  const SCHEME: &'static str = "none";
}

impl FromUrl for HeadlessOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(HeadlessOutput)
  }
}

impl Render<RgbImage, Overlay> for HeadlessOutput {
  type Error = std::convert::Infallible;

  fn render_result(&self, _frame: &RgbImage, _result: &Overlay) -> Result<(), Self::Error> {
    Ok(())
  }
}

pub enum OutputWrapper {
  Headless(HeadlessOutput),
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      HeadlessOutput::SCHEME => Ok(OutputWrapper::Headless(HeadlessOutput::from_url(url)?)),
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl OutputWrapper {
  pub fn kind(&self) -> &'static str {
    match self {
      OutputWrapper::Headless(_) => "headless",
      OutputWrapper::SaveImageFileOutput(_) => "image",
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(_) => "folder",
    }
  }

  /// 替换叠加层字体，只影响会绘制文字的输出
  pub fn with_draw(mut self, draw: draw::Draw) -> Self {
    match &mut self {
      OutputWrapper::Headless(_) => {}
      OutputWrapper::SaveImageFileOutput(output) => output.set_draw(draw),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output.set_draw(draw),
    }
    self
  }
}

impl Drop for OutputWrapper {
  fn drop(&mut self) {
    info!("关闭输出: {}", self.kind());
  }
}

impl Render<RgbImage, Overlay> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &Overlay) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Headless(_) => Ok(()),
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn headless_output_from_url() {
    let output = OutputWrapper::from_url(&Url::parse("none:").unwrap()).unwrap();
    assert_eq!(output.kind(), "headless");
  }

  #[test]
  fn headless_output_checks_its_scheme() {
    assert!(HeadlessOutput::from_url(&Url::parse("none:").unwrap()).is_ok());
    assert!(matches!(
      HeadlessOutput::from_url(&Url::parse("image:///tmp/live.png").unwrap()),
      Err(OutputError::SchemeMismatch(s)) if s == "image"
    ));
  }

  #[test]
  fn unknown_output_scheme_is_rejected() {
    let result = OutputWrapper::from_url(&Url::parse("rtsp://localhost/live").unwrap());
    assert!(matches!(result, Err(OutputError::SchemeMismatch(s)) if s == "rtsp"));
  }
}
