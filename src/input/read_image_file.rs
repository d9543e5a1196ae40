// 该文件是 Zhilu （指路） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, Frame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid repeat count: {0}")]
  InvalidRepeat(String),
}

/// 单张图片输入，`?repeat=N` 时重复产生 N 帧
pub struct ImageFileInput {
  image: RgbImage,
  remaining: u64,
  index: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let mut repeat = 1;
    let mut order = ChannelOrder::Rgb;
    for (k, v) in url.query_pairs() {
      match &*k {
        "repeat" => {
          repeat = v
            .parse::<u64>()
            .map_err(|_| ImageFileInputError::InvalidRepeat(v.to_string()))?
        }
        "order" => order = ChannelOrder::from_query(Some(&*v)),
        _ => {}
      }
    }

    let path = url.path();
    info!("读取图像文件: {}", path);
    let image = ImageReader::open(path)?.decode()?.to_rgb8();

    Ok(Self::from_image(order.normalize(image), repeat))
  }
}

impl ImageFileInput {
  pub fn from_image(image: RgbImage, repeat: u64) -> Self {
    Self {
      image,
      remaining: repeat,
      index: 0,
    }
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    let frame = Frame::new(self.index, self.image.clone());
    self.index += 1;
    Some(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn repeat_yields_indexed_copies() {
    let image = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
    let frames: Vec<Frame> = ImageFileInput::from_image(image.clone(), 3).collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames.iter().map(|f| f.index).collect::<Vec<_>>(), [0, 1, 2]);
    assert!(frames.iter().all(|f| f.image == image));
  }

  #[test]
  fn bgr_file_is_normalized() {
    let path = std::env::temp_dir().join(format!("zhilu-input-{}.png", std::process::id()));
    RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}?order=bgr&repeat=2", path.display())).unwrap();
    let input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.dimensions(), (2, 2));
    let frames: Vec<Frame> = input.collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].image.get_pixel(0, 0), &Rgb([30, 20, 10]));

    std::fs::remove_file(&path).unwrap();
  }

  #[test]
  fn bad_repeat_is_an_error() {
    let url = Url::parse("image:///nonexistent.png?repeat=many").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::InvalidRepeat(_))
    ));
  }
}
