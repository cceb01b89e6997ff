// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/bin/server.rs - 检测网页服务
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

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use tiangong::{
  args::DetectArgs,
  server::{self, AppState, DEFAULT_LISTEN, DEFAULT_MAX_UPLOAD_MB},
};

/// Tiangong 检测网页服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detect: DetectArgs,

  /// 监听地址
  #[arg(long, default_value = DEFAULT_LISTEN, value_name = "ADDR")]
  pub listen: SocketAddr,

  /// 单次上传的最大尺寸（MB）
  #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB, value_name = "MB")]
  pub max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
  tiangong::init_tracing();

  let args = Args::parse();
  let defaults = args.detect.options()?;

  let pipeline = match args.detect.pipeline() {
    Ok(pipeline) => Arc::new(pipeline),
    Err(e) => {
      error!("模型无法加载，服务不会启动: {:#}", e);
      return Err(e);
    }
  };
  let handle = pipeline.model().clone();

  let state = AppState::new(pipeline, defaults);
  let app = server::router(state, args.max_upload_mb * 1024 * 1024);

  let listener = tokio::net::TcpListener::bind(args.listen)
    .await
    .with_context(|| format!("无法监听 {}", args.listen))?;
  info!("🚀 检测服务已启动: http://{}", args.listen);
  info!("📂 临时文件目录: {}", args.detect.scratch_dir.display());

  axum::serve(listener, app)
    .with_graceful_shutdown(server::shutdown_signal(handle))
    .await?;

  info!("服务已退出");
  Ok(())
}
