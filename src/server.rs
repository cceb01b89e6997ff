// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/server.rs - HTTP 服务
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

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::{
  config::DetectOptions,
  model::{Model, ModelHandle},
  pipeline::Pipeline,
};

mod form;
mod routes;

pub use self::form::{DetectForm, FormError};

pub const SCRATCH_ROUTE: &str = "/scratch";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8501";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

pub struct AppState<M> {
  pub pipeline: Arc<Pipeline<M>>,
  /// 请求未指定时使用的检测参数
  pub defaults: DetectOptions,
}

impl<M> AppState<M> {
  pub fn new(pipeline: Arc<Pipeline<M>>, defaults: DetectOptions) -> Self {
    Self { pipeline, defaults }
  }
}

impl<M> Clone for AppState<M> {
  fn clone(&self) -> Self {
    Self {
      pipeline: self.pipeline.clone(),
      defaults: self.defaults,
    }
  }
}

pub fn router<M>(state: AppState<M>, max_upload_bytes: usize) -> Router
where
  M: Model + Send + Sync + 'static,
{
  let scratch_root = state.pipeline.scratch().root().to_path_buf();

  Router::new()
    .route("/", get(routes::index::<M>))
    .route("/detect", post(routes::detect_html::<M>))
    .route("/api/detect", post(routes::detect_json::<M>))
    .route("/healthz", get(routes::healthz::<M>))
    .nest_service(SCRATCH_ROUTE, ServeDir::new(scratch_root))
    .layer(DefaultBodyLimit::disable())
    .layer(RequestBodyLimitLayer::new(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 等待 Ctrl-C，然后释放模型，之后的请求都会得到 503
pub async fn shutdown_signal<M>(handle: Arc<ModelHandle<M>>) {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听退出信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到退出信号，释放模型");
  handle.teardown();
}
