// 该文件是 Zhilu （指路） 项目的一部分。
// src/input/read_directory.rs - 图像序列目录输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{collections::VecDeque, path::PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, Frame},
};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 录制好的图像序列：按文件名排序逐张读取
pub struct DirectoryInput {
  files: VecDeque<PathBuf>,
  order: ChannelOrder,
  index: u64,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemaMismatch);
    }

    let order = ChannelOrder::from_query(
      url
        .query_pairs()
        .find(|(k, _)| k == "order")
        .map(|(_, v)| v.into_owned())
        .as_deref(),
    );

    let mut files = std::fs::read_dir(url.path())?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path
          .extension()
          .and_then(|e| e.to_str())
          .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
      })
      .collect::<Vec<_>>();
    files.sort();
    info!("目录 {} 中共有 {} 张图像", url.path(), files.len());

    Ok(DirectoryInput {
      files: files.into(),
      order,
      index: 0,
    })
  }
}

impl DirectoryInput {
  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.files.pop_front() {
      let image = match ImageReader::open(&path).map(|r| r.decode()) {
        Ok(Ok(image)) => image.to_rgb8(),
        Ok(Err(e)) => {
          error!("无法解码图像 {}: {}", path.display(), e);
          continue;
        }
        Err(e) => {
          error!("无法打开图像 {}: {}", path.display(), e);
          continue;
        }
      };

      let frame = Frame::new(self.index, self.order.normalize(image));
      self.index += 1;
      return Some(frame);
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn images_are_read_in_name_order() {
    let dir = std::env::temp_dir().join(format!("zhilu-folder-input-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    RgbImage::from_pixel(2, 2, Rgb([2, 0, 0])).save(dir.join("b.png")).unwrap();
    RgbImage::from_pixel(2, 2, Rgb([1, 0, 0])).save(dir.join("a.png")).unwrap();
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
    std::fs::write(dir.join("c.png"), "broken").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.display())).unwrap();
    let input = DirectoryInput::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 3);

    let frames: Vec<Frame> = input.collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].image.get_pixel(0, 0), &Rgb([1, 0, 0]));
    assert_eq!(frames[1].image.get_pixel(0, 0), &Rgb([2, 0, 0]));
    assert_eq!(frames[1].index, 1);

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
