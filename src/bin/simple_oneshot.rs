// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图片检测
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use tiangong::{
  FromUrl,
  args::DetectArgs,
  output::{OutputWrapper, text::render_text},
  task::{OneShotTask, Task},
};

/// 对一张图片做一次检测，打印汇总
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detect: DetectArgs,

  /// 输入图片（jpg / jpeg / png）
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,

  /// 输出，可重复：`image:///path/out.png`、`json:///path/report.json`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,
}

fn main() -> Result<()> {
  tiangong::init_tracing();

  let args = Args::parse();

  info!("模型: {}", args.detect.model);
  info!("输入图片: {}", args.input.display());

  let options = args.detect.options()?;
  let pipeline = args.detect.pipeline()?;
  let outputs = args
    .output
    .iter()
    .map(OutputWrapper::from_url)
    .collect::<Result<Vec<_>, _>>()?;

  let report =
    OneShotTask::new(options).run_task(args.input.as_path(), &pipeline, outputs.as_slice())?;
  print!("{}", render_text(&report));

  Ok(())
}
