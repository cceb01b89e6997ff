// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/input.rs - 上传图像的接收与解码
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

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::debug;

mod scratch;
pub use self::scratch::{ScratchDir, ScratchFile};

/// 允许上传的文件扩展名
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum IngressError {
  #[error("上传内容为空")]
  EmptyUpload,
  #[error("不支持的文件类型 '{0}'，仅支持 jpg、jpeg、png")]
  UnsupportedExtension(String),
  #[error("临时文件写入错误: {0}")]
  Scratch(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("无法识别的图像数据")]
  UnknownFormat,
  #[error("不支持的图像格式: {0:?}")]
  UnsupportedFormat(ImageFormat),
  #[error("图像解码失败: {0}")]
  Image(#[from] image::ImageError),
}

/// 用户上传的原始文件
#[derive(Debug, Clone)]
pub struct UploadedImage {
  filename: String,
  bytes: Vec<u8>,
}

impl UploadedImage {
  pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      filename: filename.into(),
      bytes: bytes.into(),
    }
  }

  pub fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let filename = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default();
    Ok(Self { filename, bytes })
  }

  pub fn filename(&self) -> &str {
    &self.filename
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// 小写的扩展名，不含点
  pub fn extension(&self) -> Option<String> {
    Path::new(&self.filename)
      .extension()
      .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
  }

  /// 检查上传是否非空且扩展名合法，返回规范化后的扩展名
  pub fn check(&self) -> Result<String, IngressError> {
    if self.is_empty() {
      return Err(IngressError::EmptyUpload);
    }
    match self.extension() {
      Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
      Some(ext) => Err(IngressError::UnsupportedExtension(ext)),
      None => Err(IngressError::UnsupportedExtension(String::new())),
    }
  }

  /// 按内容解码，内容必须是 PNG 或 JPEG
  pub fn decode(&self) -> Result<DecodedImage, DecodeError> {
    let format = image::guess_format(&self.bytes).map_err(|_| DecodeError::UnknownFormat)?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
      return Err(DecodeError::UnsupportedFormat(format));
    }

    let image = image::load_from_memory_with_format(&self.bytes, format)?.to_rgb8();
    debug!(
      "解码 {}: {:?} {}x{}",
      self.filename,
      format,
      image.width(),
      image.height()
    );

    Ok(DecodedImage { image, format })
  }
}

/// 解码后的 RGB 图像
#[derive(Debug, Clone)]
pub struct DecodedImage {
  image: RgbImage,
  format: ImageFormat,
}

impl DecodedImage {
  pub fn into_image(self) -> RgbImage {
    self.image
  }

  pub fn format(&self) -> ImageFormat {
    self.format
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 展示用的图像信息
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ImageInfo {
  pub filename: String,
  pub width: u32,
  pub height: u32,
  pub size_bytes: usize,
}

impl ImageInfo {
  pub fn new(upload: &UploadedImage, decoded: &DecodedImage) -> Self {
    Self {
      filename: upload.filename().to_string(),
      width: decoded.width(),
      height: decoded.height(),
      size_bytes: upload.len(),
    }
  }

  /// 例如 `tank.png (640 x 480, 12.5 KB)`
  pub fn caption(&self) -> String {
    format!(
      "{} ({} x {}, {:.1} KB)",
      self.filename,
      self.width,
      self.height,
      self.size_bytes as f64 / 1024.0
    )
  }
}
