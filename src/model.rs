// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/model.rs - 检测模型
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

use image::RgbImage;
use thiserror::Error;

use crate::config::DetectOptions;

mod handle;
mod labels;
mod yolo;

pub use self::handle::ModelHandle;
pub use self::labels::{LabelError, LabelTable};
pub use self::yolo::{YOLO_SCHEME, YoloBuilder, YoloModel};

pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  fn name(&self) -> &str;
  fn labels(&self) -> &LabelTable;
  fn infer(&self, image: &RgbImage, params: &InferParams) -> Result<DetectResult, Self::Error>;
}

/// 推理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferParams {
  pub confidence: f32,
  pub nms_threshold: f32,
  /// 送入模型前缩放到的边长
  pub image_size: u32,
}

impl From<&DetectOptions> for InferParams {
  fn from(options: &DetectOptions) -> Self {
    Self {
      confidence: options.confidence,
      nms_threshold: options.nms_threshold,
      image_size: options.image_size,
    }
  }
}

/// 模型原始输出的一个目标
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，原图像素坐标
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型不可用: {0}")]
  Unavailable(String),
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{found}'")]
  SchemeMismatch {
    expected: &'static str,
    found: String,
  },
  #[error("标签表错误: {0}")]
  Labels(#[from] LabelError),
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("模型输出无效: {0}")]
  InvalidOutput(String),
}
