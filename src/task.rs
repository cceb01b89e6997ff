// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/task.rs - 命令行任务
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

use std::{path::Path, time::Instant};

use anyhow::Context;
use tracing::info;

use crate::{
  config::DetectOptions,
  input::UploadedImage,
  model::Model,
  output::Render,
  pipeline::{Pipeline, Report},
};

pub trait Task<I, P, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, pipeline: P, outputs: O) -> Result<Self::Output, Self::Error>;
}

/// 读取一张图片，检测一次，依次交给每个输出
#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotTask {
  options: DetectOptions,
}

impl OneShotTask {
  pub fn new(options: DetectOptions) -> Self {
    Self { options }
  }
}

impl<'a, M, O> Task<&'a Path, &'a Pipeline<M>, &'a [O]> for OneShotTask
where
  M: Model,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = Report;
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: &'a Path,
    pipeline: &'a Pipeline<M>,
    outputs: &'a [O],
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let upload = UploadedImage::open(input)
      .with_context(|| format!("无法读取输入文件 {}", input.display()))?;

    let now = Instant::now();
    let report = pipeline.detect(&upload, &self.options)?;
    info!(
      "检测完成，耗时: {:.2?}，共 {} 个目标",
      now.elapsed(),
      report.outcome.total()
    );

    for output in outputs {
      output.render_result(&report)?;
    }
    info!("渲染完成，共 {} 个输出", outputs.len());

    Ok(report)
  }
}
