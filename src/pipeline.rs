// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/pipeline.rs - 上传 -> 推理 -> 汇总 的检测流水线
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

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{ConfigError, DetectOptions},
  input::{DecodeError, ImageInfo, IngressError, ScratchDir, ScratchFile, UploadedImage},
  model::{InferParams, Model, ModelHandle},
  output::draw::{Draw, DrawError},
  summary::{DetectionSet, Outcome},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("参数无效: {0}")]
  InvalidOptions(#[from] ConfigError),
  #[error("上传无效: {0}")]
  Ingress(#[from] IngressError),
  #[error("{0}")]
  Decode(#[from] DecodeError),
  #[error("模型不可用: {0}")]
  ModelUnavailable(String),
  #[error("推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl PipelineError {
  /// 机器可读的错误类别
  pub fn kind(&self) -> &'static str {
    match self {
      PipelineError::InvalidOptions(_) => "invalid_options",
      PipelineError::Ingress(IngressError::Scratch(_)) => "scratch_io",
      PipelineError::Ingress(_) => "unsupported_upload",
      PipelineError::Decode(_) => "decode_error",
      PipelineError::ModelUnavailable(_) => "model_unavailable",
      PipelineError::Inference(_) => "inference_error",
    }
  }

  /// 面向用户、可以据此采取行动的说明
  pub fn user_message(&self) -> &'static str {
    match self {
      PipelineError::InvalidOptions(_) => {
        "The detection settings are invalid. Use a confidence between 0 and 1."
      }
      PipelineError::Ingress(IngressError::EmptyUpload) => {
        "The uploaded file is empty. Please upload a JPG or PNG image."
      }
      PipelineError::Ingress(IngressError::UnsupportedExtension(_)) => {
        "Only .jpg, .jpeg and .png files are accepted. Please upload a different file."
      }
      PipelineError::Ingress(IngressError::Scratch(_)) => {
        "The upload could not be stored. Please try again or contact the operator."
      }
      PipelineError::Decode(_) => {
        "The uploaded file is not a readable image. Please re-upload a valid JPG or PNG image."
      }
      PipelineError::ModelUnavailable(_) => {
        "The detection model is not available. Please contact the operator; the model failed to load."
      }
      PipelineError::Inference(_) => {
        "Detection failed while running the model. Please contact the operator."
      }
    }
  }

  /// 模型不可用对整个会话都是致命的，其余错误只影响当前请求
  pub fn is_fatal(&self) -> bool {
    matches!(self, PipelineError::ModelUnavailable(_))
  }
}

/// 一次检测的完整结果
#[derive(Debug, Clone)]
pub struct Report {
  pub model: String,
  pub info: ImageInfo,
  pub scratch: ScratchFile,
  pub image: RgbImage,
  pub detections: DetectionSet,
  pub outcome: Outcome,
  pub annotated: Option<RgbImage>,
}

pub struct Pipeline<M> {
  model: Arc<ModelHandle<M>>,
  scratch: ScratchDir,
  draw: Draw,
}

impl<M: Model> Pipeline<M> {
  pub fn new(model: Arc<ModelHandle<M>>, scratch: ScratchDir) -> Result<Self, DrawError> {
    Ok(Self {
      model,
      scratch,
      draw: Draw::new()?,
    })
  }

  pub fn model(&self) -> &Arc<ModelHandle<M>> {
    &self.model
  }

  pub fn scratch(&self) -> &ScratchDir {
    &self.scratch
  }

  pub fn detect(
    &self,
    upload: &UploadedImage,
    options: &DetectOptions,
  ) -> Result<Report, PipelineError> {
    options.validate()?;
    let extension = upload.check()?;

    let model = self.model.current().ok_or_else(|| {
      PipelineError::ModelUnavailable("模型已被释放或尚未加载".to_string())
    })?;

    let scratch = self
      .scratch
      .persist(upload.bytes(), &extension)
      .map_err(IngressError::from)?;
    info!("收到上传 {} -> {}", upload.filename(), scratch.path().display());

    let decoded = upload.decode()?;
    let info = ImageInfo::new(upload, &decoded);
    let image = decoded.into_image();

    let now = Instant::now();
    let raw = model
      .infer(&image, &InferParams::from(options))
      .map_err(|e| PipelineError::Inference(Box::new(e)))?;
    info!(
      "推理完成，耗时: {:.2?}，原始结果 {} 个",
      now.elapsed(),
      raw.len()
    );

    let detections = DetectionSet::from_result(
      &raw,
      model.labels(),
      image.width(),
      image.height(),
      options.confidence,
    );
    let outcome = Outcome::from_set(&detections);
    debug!("汇总结果: {:?}", outcome);

    let annotated = options
      .annotate
      .then(|| self.draw.annotate(&image, &detections));

    Ok(Report {
      model: model.name().to_string(),
      info,
      scratch,
      image,
      detections,
      outcome,
      annotated,
    })
  }
}
