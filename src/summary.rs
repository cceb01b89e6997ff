// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/summary.rs - 检测结果校验与汇总
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

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

use crate::model::{DetectItem, DetectResult, LabelTable};

#[derive(Error, Debug, PartialEq)]
pub enum InvalidDetection {
  #[error("置信度无效: {0}")]
  Confidence(f32),
  #[error("边界框坐标无效: {0:?}")]
  BoundingBox([f32; 4]),
}

/// 按 `f32` 的最短十进制表示输出，`0.85` 不会变成 `0.8500000238418579`
pub(crate) fn serialize_f32<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
  let widened = value.to_string().parse::<f64>().unwrap_or(f64::from(*value));
  serializer.serialize_f64(widened)
}

/// 原图像素坐标下的边界框
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
  #[serde(serialize_with = "serialize_f32")]
  pub x1: f32,
  #[serde(serialize_with = "serialize_f32")]
  pub y1: f32,
  #[serde(serialize_with = "serialize_f32")]
  pub x2: f32,
  #[serde(serialize_with = "serialize_f32")]
  pub y2: f32,
}

impl BoundingBox {
  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  /// 裁剪到 `width x height` 的图像范围内
  pub fn clamp_to(self, width: u32, height: u32) -> Self {
    let (w, h) = (width as f32, height as f32);
    Self {
      x1: self.x1.clamp(0.0, w),
      y1: self.y1.clamp(0.0, h),
      x2: self.x2.clamp(0.0, w),
      y2: self.y2.clamp(0.0, h),
    }
  }
}

/// 经过校验的单个检测目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub class_id: u32,
  pub class_name: String,
  #[serde(serialize_with = "serialize_f32")]
  pub confidence: f32,
  pub bbox: BoundingBox,
}

impl Detection {
  /// 把模型原始输出转成检测目标：得分必须是 [0, 1] 内的有限值，
  /// 坐标必须有限，角点顺序颠倒时交换，最后裁剪到图像范围
  pub fn from_item(
    item: &DetectItem,
    labels: &LabelTable,
    width: u32,
    height: u32,
  ) -> Result<Self, InvalidDetection> {
    if !item.score.is_finite() || !(0.0..=1.0).contains(&item.score) {
      return Err(InvalidDetection::Confidence(item.score));
    }
    if item.bbox.iter().any(|v| !v.is_finite()) {
      return Err(InvalidDetection::BoundingBox(item.bbox));
    }

    let [a, b, c, d] = item.bbox;
    let bbox = BoundingBox {
      x1: a.min(c),
      y1: b.min(d),
      x2: a.max(c),
      y2: b.max(d),
    }
    .clamp_to(width, height);

    Ok(Self {
      class_id: item.class_id,
      class_name: labels.name(item.class_id),
      confidence: item.score,
      bbox,
    })
  }
}

/// 一张图像上通过阈值的全部检测目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSet {
  #[serde(serialize_with = "serialize_f32")]
  threshold: f32,
  detections: Vec<Detection>,
}

impl DetectionSet {
  /// 按阈值筛选，保留原有顺序
  pub fn filter(detections: impl IntoIterator<Item = Detection>, threshold: f32) -> Self {
    Self {
      threshold,
      detections: detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect(),
    }
  }

  /// 校验模型原始输出并按阈值筛选，无效条目记录警告后丢弃
  pub fn from_result(
    result: &DetectResult,
    labels: &LabelTable,
    width: u32,
    height: u32,
    threshold: f32,
  ) -> Self {
    let detections = result
      .iter()
      .filter_map(
        |item| match Detection::from_item(item, labels, width, height) {
          Ok(detection) => Some(detection),
          Err(e) => {
            warn!("丢弃无效的检测结果: {}", e);
            None
          }
        },
      )
      .collect::<Vec<_>>();
    Self::filter(detections, threshold)
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Detection> {
    self.detections.iter()
  }

  pub fn as_slice(&self) -> &[Detection] {
    &self.detections
  }
}

/// 各类别的计数，按类别名字母序排列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  counts: BTreeMap<String, usize>,
  total: usize,
}

impl Summary {
  pub fn from_set(set: &DetectionSet) -> Self {
    let mut counts = BTreeMap::new();
    for detection in set.iter() {
      *counts.entry(detection.class_name.clone()).or_insert(0) += 1;
    }
    Self {
      counts,
      total: set.len(),
    }
  }

  pub fn counts(&self) -> &BTreeMap<String, usize> {
    &self.counts
  }

  pub fn count(&self, class_name: &str) -> usize {
    self.counts.get(class_name).copied().unwrap_or(0)
  }

  pub fn total(&self) -> usize {
    self.total
  }

  pub fn unique_classes(&self) -> usize {
    self.counts.len()
  }
}

/// 检测结论：没有目标不是错误，而是单独的一种结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Empty,
  NonEmpty(Summary),
}

impl Outcome {
  pub fn from_set(set: &DetectionSet) -> Self {
    if set.is_empty() {
      Outcome::Empty
    } else {
      Outcome::NonEmpty(Summary::from_set(set))
    }
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Outcome::Empty)
  }

  /// `Empty` 对应计数为空、总数为 0 的汇总
  pub fn summary(&self) -> Summary {
    match self {
      Outcome::Empty => Summary::default(),
      Outcome::NonEmpty(summary) => summary.clone(),
    }
  }

  pub fn total(&self) -> usize {
    match self {
      Outcome::Empty => 0,
      Outcome::NonEmpty(summary) => summary.total(),
    }
  }
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn labels() -> LabelTable {
    LabelTable::from_names(["OxygenTank", "Helmet"])
  }

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: [10.0, 10.0, 50.0, 60.0],
    }
  }

  fn result(items: Vec<DetectItem>) -> DetectResult {
    DetectResult::from(items)
  }

  #[test]
  fn counts_classes_alphabetically() {
    let raw = result(vec![item(0, 0.9), item(1, 0.8), item(0, 0.7), item(0, 0.3)]);
    let set = DetectionSet::from_result(&raw, &labels(), 100, 100, 0.5);
    let outcome = Outcome::from_set(&set);

    let Outcome::NonEmpty(summary) = outcome else {
      panic!("expected detections");
    };
    assert_eq!(summary.total(), 3);
    assert_eq!(summary.count("OxygenTank"), 2);
    assert_eq!(summary.count("Helmet"), 1);
    assert_eq!(summary.unique_classes(), 2);
    let order: Vec<_> = summary.counts().keys().cloned().collect();
    assert_eq!(order, vec!["Helmet", "OxygenTank"]);
  }

  #[test]
  fn nothing_above_threshold_is_empty_outcome() {
    let raw = result(vec![item(0, 0.2), item(1, 0.1)]);
    let set = DetectionSet::from_result(&raw, &labels(), 100, 100, 0.5);
    let outcome = Outcome::from_set(&set);

    assert!(outcome.is_empty());
    assert_eq!(outcome.summary(), Summary::default());
    assert_eq!(outcome.summary().total(), 0);
    assert!(outcome.summary().counts().is_empty());
  }

  #[test]
  fn threshold_is_inclusive() {
    let raw = result(vec![item(0, 0.5)]);
    let set = DetectionSet::from_result(&raw, &labels(), 100, 100, 0.5);
    assert_eq!(set.len(), 1);
  }

  #[test]
  fn invalid_items_are_dropped() {
    let mut nan_box = item(0, 0.9);
    nan_box.bbox[2] = f32::NAN;
    let raw = result(vec![item(0, f32::NAN), item(0, 1.5), nan_box, item(1, 0.9)]);
    let set = DetectionSet::from_result(&raw, &labels(), 100, 100, 0.0);

    assert_eq!(set.len(), 1);
    assert_eq!(set.as_slice()[0].class_name, "Helmet");
  }

  #[test]
  fn boxes_are_ordered_and_clamped() {
    let raw = DetectItem {
      class_id: 3,
      score: 0.9,
      bbox: [120.0, 80.0, -5.0, 10.0],
    };
    let detection = Detection::from_item(&raw, &labels(), 100, 50).unwrap();

    assert_eq!(detection.class_name, "class_3");
    assert_eq!(
      detection.bbox,
      BoundingBox {
        x1: 0.0,
        y1: 10.0,
        x2: 100.0,
        y2: 50.0
      }
    );
    assert_eq!(detection.bbox.width(), 100.0);
    assert_eq!(detection.bbox.height(), 40.0);
  }

  proptest! {
    #[test]
    fn total_matches_detections_above_threshold(
      scores in proptest::collection::vec(0.0f32..=1.0, 0..40),
      threshold in 0.0f32..=1.0,
    ) {
      let raw = result(scores.iter().enumerate().map(|(i, s)| item((i % 2) as u32, *s)).collect());
      let set = DetectionSet::from_result(&raw, &labels(), 100, 100, threshold);
      let outcome = Outcome::from_set(&set);
      let expected = scores.iter().filter(|s| **s >= threshold).count();

      prop_assert_eq!(outcome.total(), expected);
      prop_assert_eq!(outcome.summary().counts().values().sum::<usize>(), expected);
      prop_assert!(set.iter().all(|d| d.confidence >= threshold));
      prop_assert_eq!(outcome.is_empty(), expected == 0);
    }

    #[test]
    fn raising_threshold_never_increases_total(
      scores in proptest::collection::vec(0.0f32..=1.0, 0..40),
      low in 0.0f32..=1.0,
      high in 0.0f32..=1.0,
    ) {
      let (low, high) = if low <= high { (low, high) } else { (high, low) };
      let raw = result(scores.iter().map(|s| item(0, *s)).collect());
      let at_low = Outcome::from_set(&DetectionSet::from_result(&raw, &labels(), 100, 100, low));
      let at_high = Outcome::from_set(&DetectionSet::from_result(&raw, &labels(), 100, 100, high));

      prop_assert!(at_high.total() <= at_low.total());
    }
  }
}
