// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::{
  FromUrl,
  config::{
    DEFAULT_CONFIDENCE, DEFAULT_IMAGE_SIZE, DEFAULT_NMS_THRESHOLD, DEFAULT_SCRATCH_DIR,
    DetectOptions, parse_model_url,
  },
  input::ScratchDir,
  model::{LabelTable, ModelHandle, YoloBuilder, YoloModel},
  pipeline::Pipeline,
};

/// 模型与检测参数，各个程序共用
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// ONNX 模型，`yolo:///path/best.onnx?threads=4` 或文件路径
  #[arg(long, value_name = "MODEL")]
  pub model: String,

  /// 类别名称文件（TOML，`names = [...]`），缺省时读取模型元数据
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_NMS_THRESHOLD, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 模型输入尺寸，需与导出时一致
  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub image_size: u32,

  /// 上传文件与标注图像的临时目录
  #[arg(long, default_value = DEFAULT_SCRATCH_DIR, value_name = "DIR")]
  pub scratch_dir: PathBuf,
}

impl DetectArgs {
  pub fn options(&self) -> anyhow::Result<DetectOptions> {
    let options = DetectOptions {
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
      image_size: self.image_size,
      ..DetectOptions::default()
    };
    options.validate()?;
    Ok(options)
  }

  pub fn load_model(&self) -> anyhow::Result<YoloModel> {
    let url = parse_model_url(&self.model)?;
    info!("模型地址: {}", url);

    let mut builder = YoloBuilder::from_url(&url)?;
    if let Some(path) = &self.labels {
      let labels = LabelTable::from_toml_file(path)
        .with_context(|| format!("无法读取类别文件 {}", path.display()))?;
      builder = builder.labels(labels);
    }

    builder
      .build()
      .with_context(|| format!("模型加载失败: {}", self.model))
  }

  /// 加载模型并建立检测流水线
  pub fn pipeline(&self) -> anyhow::Result<Pipeline<YoloModel>> {
    let handle = Arc::new(ModelHandle::new(self.load_model()?));
    let scratch = ScratchDir::new(&self.scratch_dir)
      .with_context(|| format!("无法创建临时目录 {}", self.scratch_dir.display()))?;
    Ok(Pipeline::new(handle, scratch)?)
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    detect: DetectArgs,
  }

  #[test]
  fn defaults_match_detect_options() {
    let cli = Cli::parse_from(["test", "--model", "best.onnx"]);
    let options = cli.detect.options().unwrap();
    assert_eq!(options, DetectOptions::default());
    assert_eq!(cli.detect.scratch_dir, PathBuf::from("uploads"));
    assert!(cli.detect.labels.is_none());
  }

  #[test]
  fn invalid_thresholds_are_rejected() {
    let cli = Cli::parse_from(["test", "--model", "best.onnx", "--confidence", "1.5"]);
    assert!(cli.detect.options().is_err());
  }

  #[test]
  fn missing_model_fails_to_load() {
    let cli = Cli::parse_from(["test", "--model", "/nonexistent/best.onnx"]);
    let err = cli.detect.load_model().unwrap_err();
    assert!(err.to_string().contains("/nonexistent/best.onnx"));
  }
}
