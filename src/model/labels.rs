// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/model/labels.rs - 类别编号到名称的映射
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
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("TOML 解析错误: {0}")]
  Toml(#[from] toml::de::Error),
  #[error("标签表为空")]
  Empty,
}

#[derive(Deserialize)]
struct LabelFile {
  names: Vec<String>,
}

/// 类别标签表，未知编号显示为 `class_{id}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
  names: BTreeMap<u32, String>,
}

impl LabelTable {
  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names
        .into_iter()
        .enumerate()
        .map(|(id, name)| (id as u32, name.into()))
        .collect(),
    }
  }

  /// 读取 `names = ["A", "B"]` 形式的 TOML 标签文件
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, LabelError> {
    let file: LabelFile = toml::from_str(content)?;
    if file.names.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self::from_names(file.names))
  }

  /// 解析 Ultralytics 导出时写入模型元数据的 `names`，
  /// 形如 `{0: 'OxygenTank', 1: 'Helmet'}`。按引号界定名称，名称内可以含有 `, `
  pub fn from_ultralytics_metadata(raw: &str) -> Option<Self> {
    let mut rest = raw.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    let mut names = BTreeMap::new();
    while !rest.is_empty() {
      let (id, tail) = rest.split_once(':')?;
      let id: u32 = id.trim().parse().ok()?;

      let tail = tail.trim_start();
      let quote = tail.chars().next().filter(|c| *c == '\'' || *c == '"')?;
      let tail = &tail[quote.len_utf8()..];
      let end = tail.find(quote)?;
      names.insert(id, tail[..end].to_string());

      rest = tail[end + quote.len_utf8()..].trim_start();
      rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    if names.is_empty() {
      return None;
    }
    Some(Self { names })
  }

  pub fn name(&self, id: u32) -> String {
    self
      .names
      .get(&id)
      .cloned()
      .unwrap_or_else(|| format!("class_{id}"))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}
