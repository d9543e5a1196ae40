// 该文件是 Zhilu （指路） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 分类器输入宽度
pub const CLASSIFIER_INPUT_W: u32 = 32;
/// 分类器输入高度
pub const CLASSIFIER_INPUT_H: u32 = 32;

/// 分类器的固定尺寸输入
pub type ClassifierInput = RgbNhwcFrame<CLASSIFIER_INPUT_W, CLASSIFIER_INPUT_H>;

pub trait AsNhwcFrame<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[u8];
}

/// 视频源的原始通道顺序。进入核心流程前统一转换为 RGB。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl ChannelOrder {
  pub fn from_query(value: Option<&str>) -> Self {
    match value.map(|v| v.to_ascii_lowercase()) {
      Some(v) if v == "bgr" => ChannelOrder::Bgr,
      _ => ChannelOrder::Rgb,
    }
  }

  /// 将以该通道顺序存储的图像转为 RGB
  pub fn normalize(self, mut image: RgbImage) -> RgbImage {
    if self == ChannelOrder::Bgr {
      for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
      }
    }
    image
  }
}

/// 视频源产生的一帧 RGB 图像
#[derive(Debug, Clone)]
pub struct Frame {
  pub index: u64,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, image: RgbImage) -> Self {
    Self { index, image }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameShapeError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("图像尺寸不匹配: 期望 {expected_w}x{expected_h}, 实际 {actual_w}x{actual_h}")]
  SizeMismatch {
    expected_w: u32,
    expected_h: u32,
    actual_w: u32,
    actual_h: u32,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameShapeError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameShapeError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> TryFrom<&RgbImage> for RgbNhwcFrame<W, H> {
  type Error = FrameShapeError;

  fn try_from(image: &RgbImage) -> Result<Self, Self::Error> {
    if image.dimensions() != (W, H) {
      return Err(FrameShapeError::SizeMismatch {
        expected_w: W,
        expected_h: H,
        actual_w: image.width(),
        actual_h: image.height(),
      });
    }
    // RgbImage 本身就是 HWC 排列
    Self::try_from(image.as_raw().clone())
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(W, H, |x, y| {
      let idx = ((y * W + x) as usize) * RGB_CHANNELS;
      Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    })
  }
}

impl<const W: u32, const H: u32> AsMut<[u8]> for RgbNhwcFrame<W, H> {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}
