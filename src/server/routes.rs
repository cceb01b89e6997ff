// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/server/routes.rs - HTTP 路由处理
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

use axum::{
  Json,
  extract::{Multipart, State},
  http::StatusCode,
  response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::{
  config::DetectOptions,
  input::IngressError,
  model::Model,
  output::{html, json as report_json},
  pipeline::{PipelineError, Report},
  server::{AppState, DetectForm, FormError, SCRATCH_ROUTE},
};

#[derive(Error, Debug)]
enum RouteError {
  #[error("{0}")]
  Form(#[from] FormError),
  #[error("{0}")]
  Pipeline(#[from] PipelineError),
  #[error("检测任务异常退出: {0}")]
  Join(#[from] JoinError),
}

impl RouteError {
  fn status(&self) -> StatusCode {
    match self {
      RouteError::Form(FormError::Multipart(e)) => e.status(),
      RouteError::Form(_) => StatusCode::BAD_REQUEST,
      RouteError::Pipeline(e) => pipeline_status(e),
      RouteError::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      RouteError::Form(e) => e.kind(),
      RouteError::Pipeline(e) => e.kind(),
      RouteError::Join(_) => "internal_error",
    }
  }

  fn user_message(&self) -> &'static str {
    match self {
      RouteError::Form(e) => e.user_message(),
      RouteError::Pipeline(e) => e.user_message(),
      RouteError::Join(_) => "Detection failed unexpectedly. Please contact the operator.",
    }
  }

  fn log(&self) {
    match self {
      RouteError::Pipeline(e) if e.is_fatal() => error!("检测失败: {}", e),
      RouteError::Join(e) => error!("检测任务异常退出: {}", e),
      other => warn!("请求被拒绝: {}", other),
    }
  }
}

fn pipeline_status(error: &PipelineError) -> StatusCode {
  match error {
    PipelineError::InvalidOptions(_) => StatusCode::BAD_REQUEST,
    PipelineError::Ingress(IngressError::Scratch(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    PipelineError::Ingress(_) | PipelineError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
    PipelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    PipelineError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

struct Detected {
  report: Report,
  options: DetectOptions,
  annotated_url: Option<String>,
}

async fn run_detection<M>(state: &AppState<M>, multipart: Multipart) -> Result<Detected, RouteError>
where
  M: Model + Send + Sync + 'static,
{
  let form = DetectForm::from_multipart(multipart).await?;
  let options = form.options(&state.defaults);
  let pipeline = state.pipeline.clone();

  // 推理是 CPU 密集的同步调用
  let (report, annotated_url) = tokio::task::spawn_blocking(move || {
    let report = pipeline.detect(&form.upload, &options)?;
    let annotated_url = report.annotated.as_ref().and_then(|annotated| {
      match pipeline.scratch().store_annotated(&report.scratch, annotated) {
        Ok(file) => Some(format!("{SCRATCH_ROUTE}/{}", file.url_path())),
        Err(e) => {
          warn!("无法保存标注图像: {}", e);
          None
        }
      }
    });
    Ok::<_, PipelineError>((report, annotated_url))
  })
  .await??;

  info!(
    "{} 检测完成: 共 {} 个目标",
    report.info.filename,
    report.outcome.total()
  );

  Ok(Detected {
    report,
    options,
    annotated_url,
  })
}

pub(super) async fn index<M>(State(state): State<AppState<M>>) -> Html<String> {
  Html(html::upload_page(&state.defaults))
}

pub(super) async fn detect_html<M>(State(state): State<AppState<M>>, multipart: Multipart) -> Response
where
  M: Model + Send + Sync + 'static,
{
  match run_detection(&state, multipart).await {
    Ok(detected) => {
      // 没有标注图时展示上传的原图
      let uploaded_url = format!("{SCRATCH_ROUTE}/{}", detected.report.scratch.url_path());
      let shown = match detected.annotated_url.as_deref() {
        Some(url) => html::ShownImage::Annotated(url),
        None => html::ShownImage::Uploaded(&uploaded_url),
      };
      Html(html::result_page(
        &detected.report,
        Some(shown),
        &detected.options,
      ))
      .into_response()
    }
    Err(e) => {
      e.log();
      (
        e.status(),
        Html(html::error_page(e.user_message(), &state.defaults)),
      )
        .into_response()
    }
  }
}

pub(super) async fn detect_json<M>(State(state): State<AppState<M>>, multipart: Multipart) -> Response
where
  M: Model + Send + Sync + 'static,
{
  match run_detection(&state, multipart).await {
    Ok(detected) => Json(report_json::report_value(
      &detected.report,
      detected.annotated_url.as_deref(),
    ))
    .into_response(),
    Err(e) => {
      e.log();
      let body = match &e {
        RouteError::Pipeline(p) => report_json::error_value(p),
        other => report_json::error_document(other.kind(), other.user_message(), &other.to_string()),
      };
      (e.status(), Json(body)).into_response()
    }
  }
}

pub(super) async fn healthz<M>(State(state): State<AppState<M>>) -> Response
where
  M: Model + Send + Sync + 'static,
{
  match state.pipeline.model().current() {
    Some(model) => Json(json!({ "status": "ok", "model": model.name() })).into_response(),
    None => (
      StatusCode::SERVICE_UNAVAILABLE,
      Json(json!({ "status": "unavailable" })),
    )
      .into_response(),
  }
}
