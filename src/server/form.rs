// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/server/form.rs - 上传表单解析
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

use axum::extract::{Multipart, multipart::MultipartError};
use thiserror::Error;
use tracing::debug;

use crate::{
  config::{ConfigError, DetectOptions, parse_confidence},
  input::UploadedImage,
};

#[derive(Error, Debug)]
pub enum FormError {
  #[error("表单解析失败: {0}")]
  Multipart(#[from] MultipartError),
  #[error("缺少上传文件字段 `file`")]
  MissingFile,
  #[error("{0}")]
  Options(#[from] ConfigError),
  #[error("无法识别的 annotate 取值 '{0}'")]
  Annotate(String),
}

impl FormError {
  pub fn kind(&self) -> &'static str {
    match self {
      FormError::Multipart(_) | FormError::MissingFile => "invalid_form",
      FormError::Options(_) | FormError::Annotate(_) => "invalid_options",
    }
  }

  pub fn user_message(&self) -> &'static str {
    match self {
      FormError::Multipart(_) => {
        "The upload could not be read. Please try again with a smaller JPG or PNG image."
      }
      FormError::MissingFile => "No file was attached. Please choose a JPG or PNG image to upload.",
      FormError::Options(_) | FormError::Annotate(_) => {
        "The detection settings are invalid. Use a confidence between 0 and 1."
      }
    }
  }
}

/// `multipart/form-data` 请求体：`file`，可选的 `confidence` 与 `annotate`
#[derive(Debug)]
pub struct DetectForm {
  pub upload: UploadedImage,
  pub confidence: Option<f32>,
  pub annotate: Option<bool>,
}

impl DetectForm {
  /// 同名字段以最后一个为准
  pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, FormError> {
    let mut upload = None;
    let mut confidence = None;
    let mut annotate = None;

    while let Some(field) = multipart.next_field().await? {
      let name = field.name().map(str::to_owned);
      match name.as_deref() {
        Some("file") => {
          let filename = field.file_name().unwrap_or_default().to_string();
          let bytes = field.bytes().await?;
          debug!("收到上传字段 file: {} ({} 字节)", filename, bytes.len());
          upload = Some(UploadedImage::new(filename, bytes.to_vec()));
        }
        Some("confidence") => {
          if let Some(value) = parse_confidence(&field.text().await?)? {
            confidence = Some(value);
          }
        }
        Some("annotate") => annotate = Some(parse_flag(&field.text().await?)?),
        other => debug!("忽略表单字段: {:?}", other),
      }
    }

    Ok(Self {
      upload: upload.ok_or(FormError::MissingFile)?,
      confidence,
      annotate,
    })
  }

  /// 用表单中的值覆盖默认参数
  pub fn options(&self, defaults: &DetectOptions) -> DetectOptions {
    let mut options = *defaults;
    if let Some(confidence) = self.confidence {
      options.confidence = confidence;
    }
    if let Some(annotate) = self.annotate {
      options.annotate = annotate;
    }
    options
  }
}

fn parse_flag(raw: &str) -> Result<bool, FormError> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "true" | "on" | "1" | "yes" => Ok(true),
    "false" | "off" | "0" | "no" | "" => Ok(false),
    other => Err(FormError::Annotate(other.to_string())),
  }
}
