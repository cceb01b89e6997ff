// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/output/json.rs - 机器可读的检测报告
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

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
  input::ImageInfo,
  pipeline::{PipelineError, Report},
  summary::{Detection, DetectionSet, Outcome, serialize_f32},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Empty,
  Detected,
}

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
  pub status: Status,
  pub model: &'a str,
  #[serde(serialize_with = "serialize_f32")]
  pub threshold: f32,
  pub total: usize,
  pub unique_classes: usize,
  pub counts: BTreeMap<String, usize>,
  pub detections: &'a [Detection],
  pub image: &'a ImageInfo,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub annotated_url: Option<&'a str>,
}

impl<'a> JsonReport<'a> {
  pub fn new(report: &'a Report, annotated_url: Option<&'a str>) -> Self {
    let status = match report.outcome {
      Outcome::Empty => Status::Empty,
      Outcome::NonEmpty(_) => Status::Detected,
    };
    let summary = report.outcome.summary();

    Self {
      status,
      model: &report.model,
      threshold: report.detections.threshold(),
      total: summary.total(),
      unique_classes: summary.unique_classes(),
      counts: summary.counts().clone(),
      detections: report.detections.as_slice(),
      image: &report.info,
      annotated_url,
    }
  }
}

pub fn report_value(report: &Report, annotated_url: Option<&str>) -> Value {
  serde_json::to_value(JsonReport::new(report, annotated_url)).unwrap_or(Value::Null)
}

pub fn error_document(kind: &str, message: &str, detail: &str) -> Value {
  json!({
    "error": kind,
    "message": message,
    "detail": detail,
  })
}

pub fn error_value(error: &PipelineError) -> Value {
  error_document(error.kind(), error.user_message(), &error.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{input::DecodeError, output::tests::sample_report};

  #[test]
  fn detected_report_shape() {
    let (report, _dir) = sample_report(&[("OxygenTank", 0.9), ("Helmet", 0.7)]);
    let value = report_value(&report, Some("/scratch/x-annotated.png"));

    assert_eq!(value["status"], "detected");
    assert_eq!(value["total"], 2);
    assert_eq!(value["unique_classes"], 2);
    assert_eq!(value["counts"]["Helmet"], 1);
    assert_eq!(value["detections"].as_array().unwrap().len(), 2);
    assert_eq!(value["detections"][0]["class_name"], "OxygenTank");
    assert_eq!(value["image"]["width"], 64);
    assert_eq!(value["model"], "fixture");
    assert_eq!(value["annotated_url"], "/scratch/x-annotated.png");
  }

  #[test]
  fn floats_keep_their_submitted_value() {
    let (mut report, _dir) = sample_report(&[("OxygenTank", 0.9), ("Helmet", 0.86)]);
    report.detections = DetectionSet::filter(report.detections.as_slice().to_vec(), 0.85);
    report.outcome = Outcome::from_set(&report.detections);

    let value = report_value(&report, None);
    assert_eq!(value["threshold"], 0.85);
    assert_eq!(value["detections"][0]["confidence"], 0.9);
    assert_eq!(value["detections"][1]["confidence"], 0.86);
    assert_eq!(value["detections"][0]["bbox"]["x2"], 30.0);

    let text = serde_json::to_string(&JsonReport::new(&report, None)).unwrap();
    assert!(text.contains("\"threshold\":0.85,"));
  }

  #[test]
  fn empty_report_has_zero_total() {
    let (report, _dir) = sample_report(&[]);
    let value = report_value(&report, None);

    assert_eq!(value["status"], "empty");
    assert_eq!(value["total"], 0);
    assert!(value["counts"].as_object().unwrap().is_empty());
    assert!(value.get("annotated_url").is_none());
  }

  #[test]
  fn error_value_carries_kind() {
    let value = error_value(&PipelineError::Decode(DecodeError::UnknownFormat));
    assert_eq!(value["error"], "decode_error");
    assert!(
      value["message"]
        .as_str()
        .unwrap()
        .contains("valid JPG or PNG")
    );
  }
}
