// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, pipeline::Report};

pub trait Render: Sized {
  type Error;
  fn render_result(&self, report: &Report) -> Result<(), Self::Error>;
}

pub mod draw;
pub mod html;
pub mod json;
pub mod text;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod save_json_file;
pub use self::save_json_file::{SaveJsonFileError, SaveJsonFileOutput};

/// 没有检测到目标时给用户的排查建议
pub const NO_DETECTION_HINTS: [&str; 4] = [
  "Ensure the image clearly shows the object.",
  "Use high-resolution images with good lighting.",
  "Confirm the object is part of the model's training classes.",
  "Try uploading a known sample (e.g., Oxygen-tank.jpg) for testing.",
];

pub const NO_DETECTION_MESSAGE: &str = "No safety objects were detected in the uploaded image.";

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("保存 JSON 文件错误: {0}")]
  SaveJsonFileError(#[from] SaveJsonFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  SaveJsonFileOutput(SaveJsonFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      SaveJsonFileOutput::SCHEME => {
        let output = SaveJsonFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveJsonFileOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, report: &Report) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(report)
        .map_err(OutputError::from),
      OutputWrapper::SaveJsonFileOutput(output) => output
        .render_result(report)
        .map_err(OutputError::from),
    }
  }
}

/// 把 URL 路径还原为文件路径
fn url_file_path(url: &Url) -> String {
  urlencoding::decode(url.path())
    .map(|path| path.into_owned())
    .unwrap_or_else(|_| url.path().to_string())
}
