// 该文件是 Zhilu （指路） 项目的一部分。
// src/output/draw.rs - 识别结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_line_segment_mut, draw_text_mut},
  point::Point,
};
use tracing::{debug, warn};

use crate::output::Overlay;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_OFFSET: (i32, i32) = (50, 10);
const LABEL_COLOR: [u8; 3] = [255, 255, 255]; // 白色
const BOX_THICKNESS: i32 = 2;

// 未指定字体时依次尝试
const SYSTEM_FONTS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// 在图像上绘制四边形，线宽 2 像素
pub fn draw_box(image: &mut RgbImage, corners: &[Point<i32>; 4], color: [u8; 3]) {
  for (i, start) in corners.iter().enumerate() {
    let end = corners[(i + 1) % corners.len()];
    for t in 0..BOX_THICKNESS {
      // 沿两个方向各偏移一次，斜边也能加粗
      for (dx, dy) in [(t, 0), (0, t)] {
        draw_line_segment_mut(
          image,
          ((start.x + dx) as f32, (start.y + dy) as f32),
          ((end.x + dx) as f32, (end.y + dy) as f32),
          Rgb(color),
        );
      }
    }
  }
}

pub struct Draw {
  font_size: f32,
  label_offset: (i32, i32),
  label_color: [u8; 3],
  font: Option<FontArc>,
}

impl Default for Draw {
  fn default() -> Self {
    let font = SYSTEM_FONTS
      .iter()
      .find_map(|path| load_font(Path::new(path)));
    if font.is_none() {
      warn!("未找到可用字体，叠加层只绘制边框");
    }
    Self::with_font(font)
  }
}

impl Draw {
  pub fn with_font(font: Option<FontArc>) -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_offset: LABEL_OFFSET,
      label_color: LABEL_COLOR,
      font,
    }
  }

  /// 从字体文件创建，读取失败时退回系统字体
  pub fn with_font_file(path: &Path) -> Self {
    match load_font(path) {
      Some(font) => Self::with_font(Some(font)),
      None => {
        warn!("无法加载字体文件: {}", path.display());
        Self::default()
      }
    }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 文本锚点：外接矩形左上角加固定偏移
  pub fn label_anchor(&self, top_left: Point<i32>) -> (i32, i32) {
    (
      top_left.x + self.label_offset.0,
      top_left.y + self.label_offset.1,
    )
  }

  /// 在已标注边框的帧上写出“标签 置信度%”
  pub fn draw_overlay(&self, image: &mut RgbImage, overlay: &Overlay) {
    let Some(font) = &self.font else {
      return;
    };

    let text = overlay.prediction.overlay_text();
    let (x, y) = self.label_anchor(overlay.top_left);
    debug!("绘制标签 \"{}\" 于 ({}, {})", text, x, y);
    draw_text_mut(
      image,
      Rgb(self.label_color),
      x,
      y,
      PxScale::from(self.font_size),
      font,
      &text,
    );
  }

  pub fn render(&self, annotated: &RgbImage, overlay: &Overlay) -> RgbImage {
    let mut image = annotated.clone();
    self.draw_overlay(&mut image, overlay);
    image
  }
}

fn load_font(path: &Path) -> Option<FontArc> {
  let data = std::fs::read(path).ok()?;
  FontArc::try_from_vec(data).ok()
}
