// 该文件是 Zhilu （指路） 项目的一部分。
// src/model/catalog.rs - 交通标志类别表
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ClassifyError, Prediction, argmax};

const LABEL_COLUMN: &str = "SignName";

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别表为空")]
  Empty,
  #[error("第 {line} 行缺少标签列")]
  MissingColumn { line: usize },
}

/// 下标到标志名称的只读映射，启动时加载一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
  labels: Box<[String]>,
}

impl Catalog {
  pub fn from_labels<I, S>(labels: I) -> Result<Self, CatalogError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let labels: Box<[String]> = labels.into_iter().map(Into::into).collect();
    if labels.is_empty() {
      return Err(CatalogError::Empty);
    }
    Ok(Self { labels })
  }

  /// 解析带表头的 CSV（如 `ClassId,SignName`）。
  /// 行的先后顺序即类别下标；优先取 `SignName` 列，没有则取最后一列。
  pub fn from_csv_str(text: &str) -> Result<Self, CatalogError> {
    let mut lines = text
      .lines()
      .map(|line| line.trim_end_matches('\r'))
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(CatalogError::Empty)?;
    let header = split_record(header.trim_start_matches('\u{feff}'));
    let column = header
      .iter()
      .position(|name| name == LABEL_COLUMN)
      .unwrap_or(header.len() - 1);
    debug!("类别表表头: {:?}, 标签列: {}", header, column);

    let labels = lines
      .map(|(idx, line)| {
        split_record(line)
          .into_iter()
          .nth(column)
          .ok_or(CatalogError::MissingColumn { line: idx + 1 })
      })
      .collect::<Result<Vec<_>, _>>()?;

    Self::from_labels(labels)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    info!("加载类别表: {}", path.display());
    let catalog = Self::from_csv_str(&std::fs::read_to_string(path)?)?;
    info!("类别表加载完成，共 {} 类", catalog.len());
    Ok(catalog)
  }

  pub fn label(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn position(&self, label: &str) -> Option<usize> {
    self.labels.iter().position(|l| l == label)
  }

  /// 由概率向量得到预测结果
  pub fn predict<E>(&self, probabilities: &[f32]) -> Result<Prediction, ClassifyError<E>> {
    if probabilities.len() != self.len() {
      return Err(ClassifyError::LengthMismatch {
        expected: self.len(),
        actual: probabilities.len(),
      });
    }

    let (index, probability) = argmax(probabilities).ok_or(ClassifyError::NoMaximum)?;
    Ok(Prediction {
      index,
      label: self.labels[index].clone(),
      confidence: 100.0 * probability,
    })
  }
}

/// 按逗号切分一行，支持双引号包裹和 `""` 转义，字段两端空白会被去掉
fn split_record(line: &str) -> Vec<String> {
  let mut fields = Vec::new();
  let mut field = String::new();
  let mut quoted = false;
  let mut chars = line.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '"' if quoted && chars.peek() == Some(&'"') => {
        field.push('"');
        chars.next();
      }
      '"' => quoted = !quoted,
      ',' if !quoted => fields.push(finish_field(&mut field)),
      _ => field.push(c),
    }
  }
  fields.push(finish_field(&mut field));
  fields
}

fn finish_field(field: &mut String) -> String {
  let value = field.trim().to_string();
  field.clear();
  value
}

#[cfg(test)]
mod tests {
  use super::*;

  const SIGNNAMES: &str = "ClassId,SignName\r\n\
    0,Speed limit (20km/h)\r\n\
    14,Stop\r\n\
    33,Turn right ahead\r\n\
    34,Turn left ahead\r\n";

  #[test]
  fn rows_are_indexed_in_file_order() {
    let catalog = Catalog::from_csv_str(SIGNNAMES).unwrap();
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.label(1), Some("Stop"));
    assert_eq!(catalog.label(3), Some("Turn left ahead"));
    assert_eq!(catalog.label(4), None);
    assert_eq!(catalog.position("Turn right ahead"), Some(2));
  }

  #[test]
  fn quoted_labels_keep_commas() {
    let catalog = Catalog::from_csv_str("SignName,ClassId\n\"Road work, left\",0\nStop,1\n").unwrap();
    assert_eq!(catalog.label(0), Some("Road work, left"));
    assert_eq!(catalog.label(1), Some("Stop"));
  }

  #[test]
  fn escaped_quotes_and_padding_are_handled() {
    let text = "\u{feff}SignName , ClassId\n\"No \"\"U\"\" turn\", 0\n  Stop  ,1\n";
    let catalog = Catalog::from_csv_str(text).unwrap();
    assert_eq!(catalog.label(0), Some("No \"U\" turn"));
    assert_eq!(catalog.label(1), Some("Stop"));

    let spaced = Catalog::from_csv_str("ClassId, SignName\n14, Stop\n").unwrap();
    assert_eq!(spaced.label(0), Some("Stop"));
  }

  #[test]
  fn header_only_is_empty() {
    assert!(matches!(
      Catalog::from_csv_str("ClassId,SignName\n"),
      Err(CatalogError::Empty)
    ));
    assert!(matches!(Catalog::from_csv_str(""), Err(CatalogError::Empty)));
  }

  #[test]
  fn short_rows_are_reported() {
    assert!(matches!(
      Catalog::from_csv_str("ClassId,SignName\n0,Stop\n1\n"),
      Err(CatalogError::MissingColumn { line: 3 })
    ));
  }

  #[test]
  fn predict_scales_probability() {
    let catalog = Catalog::from_labels(["A", "B", "C"]).unwrap();
    let prediction = catalog.predict::<()>(&[0.1, 0.7, 0.2]).unwrap();
    assert_eq!(prediction.label, "B");
    assert!((prediction.confidence - 70.0).abs() < 1e-4);
  }
}
