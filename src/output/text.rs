// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/output/text.rs - 终端文本汇总
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

use std::fmt::Write;

use crate::{
  output::{NO_DETECTION_HINTS, NO_DETECTION_MESSAGE},
  pipeline::Report,
  summary::Outcome,
};

pub fn render_text(report: &Report) -> String {
  let mut text = String::new();
  let _ = writeln!(text, "{}", report.info.caption());
  let _ = writeln!(text, "Detection Summary");

  match &report.outcome {
    Outcome::NonEmpty(summary) => {
      for (class, count) in summary.counts() {
        let _ = writeln!(text, "  ✔ {class} × {count}");
      }
      let _ = writeln!(
        text,
        "Total objects detected: {} ({} unique classes)",
        summary.total(),
        summary.unique_classes()
      );
    }
    Outcome::Empty => {
      let _ = writeln!(text, "{NO_DETECTION_MESSAGE}");
      for hint in NO_DETECTION_HINTS {
        let _ = writeln!(text, "  - {hint}");
      }
    }
  }

  text
}
