// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/config.rs - 检测参数与配置
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
use url::Url;

use crate::model::YOLO_SCHEME;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
pub const DEFAULT_IMAGE_SIZE: u32 = 640;
pub const DEFAULT_SCRATCH_DIR: &str = "uploads";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 之间: {0}")]
  Confidence(f32),
  #[error("NMS 阈值必须在 [0, 1] 之间: {0}")]
  NmsThreshold(f32),
  #[error("输入尺寸必须为正整数: {0}")]
  ImageSize(u32),
  #[error("无法解析数值 '{0}'")]
  Unparsable(String),
  #[error("模型地址无效: {0}")]
  ModelUrl(String),
}

/// 单次检测请求的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
  pub confidence: f32,
  pub nms_threshold: f32,
  pub image_size: u32,
  /// 是否生成带检测框的图像
  pub annotate: bool,
}

impl Default for DetectOptions {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      image_size: DEFAULT_IMAGE_SIZE,
      annotate: true,
    }
  }
}

impl DetectOptions {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn with_annotate(mut self, annotate: bool) -> Self {
    self.annotate = annotate;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.confidence) {
      return Err(ConfigError::Confidence(self.confidence));
    }
    if !(0.0..=1.0).contains(&self.nms_threshold) {
      return Err(ConfigError::NmsThreshold(self.nms_threshold));
    }
    if self.image_size == 0 {
      return Err(ConfigError::ImageSize(self.image_size));
    }
    Ok(())
  }
}

/// 解析表单或命令行里的置信度，空字符串视为未设置
pub fn parse_confidence(raw: &str) -> Result<Option<f32>, ConfigError> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(None);
  }
  let value: f32 = raw
    .parse()
    .map_err(|_| ConfigError::Unparsable(raw.to_string()))?;
  if !(0.0..=1.0).contains(&value) {
    return Err(ConfigError::Confidence(value));
  }
  Ok(Some(value))
}

/// 接受 `yolo:///path/best.onnx` 形式的地址，也接受普通文件路径
pub fn parse_model_url(raw: &str) -> Result<Url, ConfigError> {
  if raw.contains("://") {
    return Url::parse(raw).map_err(|e| ConfigError::ModelUrl(format!("{raw}: {e}")));
  }

  let path = std::path::absolute(Path::new(raw))
    .map_err(|e| ConfigError::ModelUrl(format!("{raw}: {e}")))?;
  Url::parse(&format!("{YOLO_SCHEME}://{}", path.to_string_lossy()))
    .map_err(|e| ConfigError::ModelUrl(format!("{raw}: {e}")))
}
