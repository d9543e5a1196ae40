// 该文件是 Zhilu （指路） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Datelike, Utc};
use image::RgbImage;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Overlay, Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 逐帧保存标注后的画面，按 年/月/日 分目录。
/// `?record` 时同时写出同名 `.json`，记录预测、指令和外接矩形。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: AtomicU32,
  record: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::with_font(None),
      frame_counter: AtomicU32::new(0),
      record,
    })
  }
}

impl DirectoryRecordOutput {
  /// 替换叠加层绘制器，from_url 只给出无字体的占位
  pub fn set_draw(&mut self, draw: Draw) {
    self.draw = draw;
  }

  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:06X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(&self, path: &Path, overlay: &Overlay) -> Result<(), DirectoryRecordOutputError> {
    let record = json!({
      "frame": overlay.frame_index,
      "label": overlay.prediction.label,
      "index": overlay.prediction.index,
      "confidence": overlay.prediction.confidence,
      "command": overlay.command.as_str(),
      "corners": overlay.corners.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
    });
    std::fs::write(path.with_extension("json"), serde_json::to_vec_pretty(&record)?)?;
    Ok(())
  }
}

impl Render<RgbImage, Overlay> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &Overlay) -> Result<(), Self::Error> {
    let path = self.frame_path()?;
    self.draw.render(frame, result).save(&path)?;
    if self.record {
      self.write_record(&path, result)?;
    }
    debug!("保存帧 {} 到: {}", result.frame_index, path.display());
    Ok(())
  }
}
