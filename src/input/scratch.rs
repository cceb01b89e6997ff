// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/input/scratch.rs - 请求级临时文件目录
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

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use image::{ImageFormat, RgbImage};
use tracing::debug;
use uuid::Uuid;

/// 临时文件根目录，文件按 `年/月/日` 分目录存放
#[derive(Debug, Clone)]
pub struct ScratchDir {
  root: PathBuf,
}

/// 写入临时目录的一个文件
#[derive(Debug, Clone, PartialEq)]
pub struct ScratchFile {
  id: Uuid,
  path: PathBuf,
  relative: PathBuf,
}

impl ScratchFile {
  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 相对根目录的路径，以 `/` 分隔，用于拼接 URL
  pub fn url_path(&self) -> String {
    self
      .relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy().into_owned())
      .collect::<Vec<_>>()
      .join("/")
  }
}

impl ScratchDir {
  pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
    let root = root.into();
    std::fs::create_dir_all(&root)?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn day_directory(&self) -> Result<PathBuf, std::io::Error> {
    let now = Utc::now();
    let relative = PathBuf::from(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(self.root.join(&relative))?;
    Ok(relative)
  }

  /// 以新的 UUID 命名写入数据，目标已存在时报错而不是覆盖
  pub fn persist(&self, bytes: &[u8], extension: &str) -> Result<ScratchFile, std::io::Error> {
    let id = Uuid::new_v4();
    let relative = self.day_directory()?.join(format!("{id}.{extension}"));
    let path = self.root.join(&relative);

    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    file.write_all(bytes)?;
    file.flush()?;
    debug!("写入临时文件: {}", path.display());

    Ok(ScratchFile { id, path, relative })
  }

  /// 在同一目录下保存与上传文件对应的标注图像 `{id}-annotated.png`
  pub fn store_annotated(
    &self,
    source: &ScratchFile,
    image: &RgbImage,
  ) -> Result<ScratchFile, image::ImageError> {
    let name = format!("{}-annotated.png", source.id);
    let relative = source
      .relative
      .parent()
      .map(|parent| parent.join(&name))
      .unwrap_or_else(|| PathBuf::from(&name));
    let path = self.root.join(&relative);

    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let mut writer = BufWriter::new(file);
    image.write_to(&mut writer, ImageFormat::Png)?;
    writer.flush()?;
    debug!("写入标注图像: {}", path.display());

    Ok(ScratchFile {
      id: source.id,
      path,
      relative,
    })
  }
}
