// 该文件是 Zhilu （指路） 项目的一部分。
// src/config.rs - 启动配置
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

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::{
  model::{Catalog, CatalogError},
  roi::RoiExtractor,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("类别表错误: {0}")]
  Catalog(#[from] CatalogError),
  #[error("Canny sigma 必须在 [0, 1] 之间: {0}")]
  InvalidSigma(f64),
}

/// 启动时确定、运行期间不变的配置，以引用方式传给主循环和分类器
#[derive(Debug, Clone)]
pub struct DriveConfig {
  pub catalog: Catalog,
  pub extractor: RoiExtractor,
}

impl DriveConfig {
  pub fn new(catalog: Catalog, sigma: f64) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&sigma) {
      return Err(ConfigError::InvalidSigma(sigma));
    }
    info!("Canny sigma: {}", sigma);
    Ok(Self {
      catalog,
      extractor: RoiExtractor::new(sigma),
    })
  }

  pub fn load(catalog: impl AsRef<Path>, sigma: f64) -> Result<Self, ConfigError> {
    Self::new(Catalog::load(catalog)?, sigma)
  }
}
