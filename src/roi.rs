// 该文件是 Zhilu （指路） 项目的一部分。
// src/roi.rs - 基于轮廓的感兴趣区域提取
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

//! # 感兴趣区域（ROI）提取
//!
//! 每帧只取一个区域：
//!
//! 1. 灰度化并做 3×3 等效的高斯平滑；
//! 2. 按中值亮度自适应地选取 Canny 双阈值（auto-canny）；
//! 3. 只保留最外层轮廓，取面积最大的一条；
//! 4. 求该轮廓的最小外接旋转矩形，按角点的 x/y 范围从原图裁剪。
//!
//! 旋转矩形的角点顺序由实现决定，因此裁剪范围和标签锚点都只依赖角点坐标的最小/最大值。

use image::{
  GrayImage, RgbImage,
  imageops::{self, FilterType},
};
use imageproc::{
  contours::{BorderType, find_contours},
  edges::canny,
  filter::gaussian_blur_f32,
  geometry::min_area_rect,
  point::Point,
};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{CLASSIFIER_INPUT_H, CLASSIFIER_INPUT_W, ClassifierInput, FrameShapeError},
  output::draw::draw_box,
};

/// auto-canny 的默认灵敏度
pub const DEFAULT_CANNY_SIGMA: f64 = 0.33;
// 与 3×3 高斯核 [1 2 1]/4 等效的标准差
const BLUR_SIGMA: f32 = 0.8;
// 全平图像的梯度为 0，阈值不能为 0，否则每个像素都会成为边缘
const MIN_EDGE_THRESHOLD: f64 = 1.0;
const BOX_COLOR: [u8; 3] = [0, 0, 255];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RoiError {
  #[error("未找到轮廓")]
  NoContour,
  #[error("ROI 尺寸退化: {width}x{height}")]
  Degenerate { width: u32, height: u32 },
  #[error("分类器输入尺寸错误: {0}")]
  Shape(#[from] FrameShapeError),
}

/// 原图上的裁剪矩形，右/下边界不含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl CropBounds {
  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

#[derive(Debug, Clone)]
pub struct Extraction {
  /// 从未标注的原图裁剪
  pub roi: RgbImage,
  /// 画上外接矩形的帧副本
  pub annotated: RgbImage,
  pub top_left: Point<i32>,
  pub corners: [Point<i32>; 4],
  pub bounds: CropBounds,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiExtractor {
  sigma: f64,
}

impl Default for RoiExtractor {
  fn default() -> Self {
    Self {
      sigma: DEFAULT_CANNY_SIGMA,
    }
  }
}

impl RoiExtractor {
  pub fn new(sigma: f64) -> Self {
    Self { sigma }
  }

  pub fn sigma(&self) -> f64 {
    self.sigma
  }

  pub fn extract(&self, frame: &RgbImage) -> Result<Extraction, RoiError> {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
      return Err(RoiError::Degenerate { width, height });
    }

    let edges = self.edges(frame);
    let contour = largest_outer_contour(&edges).ok_or(RoiError::NoContour)?;
    let corners = min_area_rect(&contour);

    let top_left = Point::new(
      corners.iter().map(|p| p.x).min().unwrap_or(0),
      corners.iter().map(|p| p.y).min().unwrap_or(0),
    );
    let bounds = crop_bounds(&corners, frame.width(), frame.height());
    debug!(
      "外接矩形角点: {:?}, 裁剪范围: {:?}",
      corners.map(|p| (p.x, p.y)),
      bounds
    );

    let roi = imageops::crop_imm(frame, bounds.x, bounds.y, bounds.width, bounds.height).to_image();
    let mut annotated = frame.clone();
    draw_box(&mut annotated, &corners, BOX_COLOR);

    Ok(Extraction {
      roi,
      annotated,
      top_left,
      corners,
      bounds,
    })
  }

  /// 平滑后的 auto-canny 边缘图
  pub fn edges(&self, frame: &RgbImage) -> GrayImage {
    let gray = imageops::grayscale(frame);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let median = median_intensity(&blurred);
    let (low, high) = auto_canny_thresholds(median, self.sigma);
    debug!("中值亮度: {}, Canny 阈值: {} / {}", median, low, high);
    canny(&blurred, low as f32, high as f32)
  }
}

pub fn median_intensity(image: &GrayImage) -> f64 {
  let mut histogram = [0usize; 256];
  for pixel in image.pixels() {
    histogram[pixel[0] as usize] += 1;
  }

  let count = (image.width() as usize) * (image.height() as usize);
  if count == 0 {
    return 0.0;
  }

  let value_at = |rank: usize| {
    let mut seen = 0;
    for (value, n) in histogram.iter().enumerate() {
      seen += n;
      if seen > rank {
        return value as f64;
      }
    }
    255.0
  };

  // 偶数个像素时取中间两个值的平均
  (value_at((count - 1) / 2) + value_at(count / 2)) / 2.0
}

pub fn auto_canny_thresholds(median: f64, sigma: f64) -> (f64, f64) {
  let lower = ((1.0 - sigma) * median).max(0.0).floor().max(MIN_EDGE_THRESHOLD);
  let upper = ((1.0 + sigma) * median).min(255.0).floor().max(lower);
  (lower, upper)
}

/// 多边形面积（鞋带公式）
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
  if points.len() < 3 {
    return 0.0;
  }
  let twice: i64 = points
    .iter()
    .zip(points.iter().cycle().skip(1))
    .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
    .sum();
  twice.abs() as f64 / 2.0
}

fn largest_outer_contour(edges: &GrayImage) -> Option<Vec<Point<i32>>> {
  let contours = find_contours::<i32>(edges);
  debug!("轮廓数量: {}", contours.len());

  contours
    .into_iter()
    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    .map(|c| (polygon_area(&c.points), c.points))
    .filter(|(area, _)| *area > 0.0)
    .fold(None, |best: Option<(f64, Vec<Point<i32>>)>, (area, points)| match best {
      Some((best_area, _)) if area <= best_area => best,
      _ => Some((area, points)),
    })
    .map(|(_, points)| points)
}

/// 角点的 x/y 范围与帧求交
pub fn crop_bounds(corners: &[Point<i32>; 4], width: u32, height: u32) -> CropBounds {
  let clamp_x = |v: i32| v.clamp(0, width as i32);
  let clamp_y = |v: i32| v.clamp(0, height as i32);

  let min_x = clamp_x(corners.iter().map(|p| p.x).min().unwrap_or(0));
  let max_x = clamp_x(corners.iter().map(|p| p.x).max().unwrap_or(0));
  let min_y = clamp_y(corners.iter().map(|p| p.y).min().unwrap_or(0));
  let max_y = clamp_y(corners.iter().map(|p| p.y).max().unwrap_or(0));

  CropBounds {
    x: min_x as u32,
    y: min_y as u32,
    width: (max_x - min_x) as u32,
    height: (max_y - min_y) as u32,
  }
}

/// 缩放到分类器输入尺寸；空 ROI 无法缩放
pub fn resize_roi(roi: &RgbImage) -> Result<ClassifierInput, RoiError> {
  if roi.width() == 0 || roi.height() == 0 {
    return Err(RoiError::Degenerate {
      width: roi.width(),
      height: roi.height(),
    });
  }

  let resized = imageops::resize(
    roi,
    CLASSIFIER_INPUT_W,
    CLASSIFIER_INPUT_H,
    FilterType::Triangle,
  );
  Ok(ClassifierInput::try_from(&resized)?)
}
