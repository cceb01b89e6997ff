// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/output/html.rs - 网页界面
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
  config::DetectOptions,
  input::ACCEPTED_EXTENSIONS,
  output::{NO_DETECTION_HINTS, NO_DETECTION_MESSAGE},
  pipeline::Report,
  summary::Outcome,
};

pub const PAGE_TITLE: &str = "🚀 Space Station Safety Object Detection";
const SUMMARY_COLOR: &str = "#ee82ee";

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 960px; margin: 2em auto; padding: 0 1em; }
h1 { font-size: 1.8em; }
figure { margin: 1em 0; }
figure img { max-width: 100%; }
.summary h2 { color: #ee82ee; }
.warning { color: #b7791f; }
.error { color: #c53030; }
"#;

/// 转义 HTML 特殊字符
pub fn escape(raw: &str) -> String {
  let mut escaped = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      c => escaped.push(c),
    }
  }
  escaped
}

fn layout(body: &str) -> String {
  format!(
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
     <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
     <h1>{title}</h1>\n{body}</body>\n</html>\n",
    title = escape(PAGE_TITLE),
  )
}

fn upload_form(options: &DetectOptions) -> String {
  let accept = ACCEPTED_EXTENSIONS
    .iter()
    .map(|ext| format!(".{ext}"))
    .collect::<Vec<_>>()
    .join(",");
  let checked = if options.annotate { " checked" } else { "" };

  format!(
    "<form action=\"/detect\" method=\"post\" enctype=\"multipart/form-data\">\n\
     <p><label>Upload an image <input type=\"file\" name=\"file\" accept=\"{accept}\" required></label></p>\n\
     <p><label>Confidence threshold <input type=\"number\" name=\"confidence\" min=\"0\" max=\"1\" step=\"0.05\" value=\"{confidence:.2}\"></label></p>\n\
     <input type=\"hidden\" name=\"annotate\" value=\"false\">\n\
     <p><label><input type=\"checkbox\" name=\"annotate\" value=\"true\"{checked}> Draw bounding boxes</label></p>\n\
     <p><button type=\"submit\">Detect</button></p>\n\
     </form>\n",
    confidence = options.confidence,
  )
}

/// 首页，只有上传表单
pub fn upload_page(options: &DetectOptions) -> String {
  layout(&upload_form(options))
}

/// 结果页上展示的图像
#[derive(Debug, Clone, Copy)]
pub enum ShownImage<'a> {
  Annotated(&'a str),
  Uploaded(&'a str),
}

impl<'a> ShownImage<'a> {
  fn url(&self) -> &'a str {
    match *self {
      ShownImage::Annotated(url) | ShownImage::Uploaded(url) => url,
    }
  }

  fn caption(&self) -> &'static str {
    match *self {
      ShownImage::Annotated(_) => "Detected objects",
      ShownImage::Uploaded(_) => "Uploaded image",
    }
  }
}

/// 检测结果页：原图说明、图像、汇总与下一次上传的表单
pub fn result_page(report: &Report, shown: Option<ShownImage<'_>>, options: &DetectOptions) -> String {
  let mut body = String::new();

  let _ = writeln!(
    body,
    "<p class=\"caption\">{}</p>",
    escape(&report.info.caption())
  );

  if let Some(shown) = shown {
    let _ = writeln!(
      body,
      "<figure><img src=\"{url}\" alt=\"{caption}\"><figcaption>{caption}</figcaption></figure>",
      url = escape(shown.url()),
      caption = shown.caption(),
    );
  }

  body.push_str(&summary_section(&report.outcome));
  body.push_str("<hr>\n");
  body.push_str(&upload_form(options));
  layout(&body)
}

fn summary_section(outcome: &Outcome) -> String {
  let mut section = String::from("<section class=\"summary\">\n");
  let _ = writeln!(
    section,
    "<h2 style=\"color: {SUMMARY_COLOR}\">Detection Summary</h2>"
  );

  match outcome {
    Outcome::NonEmpty(summary) => {
      section.push_str("<ul>\n");
      for (class, count) in summary.counts() {
        let _ = writeln!(section, "<li>✔ {} × {}</li>", escape(class), count);
      }
      section.push_str("</ul>\n");
      let _ = writeln!(
        section,
        "<p><strong>Total objects detected: {} ({} unique classes)</strong></p>",
        summary.total(),
        summary.unique_classes()
      );
    }
    Outcome::Empty => {
      let _ = writeln!(section, "<p class=\"warning\">{}</p>", NO_DETECTION_MESSAGE);
      section.push_str("<ul class=\"hints\">\n");
      for hint in NO_DETECTION_HINTS {
        let _ = writeln!(section, "<li>{}</li>", escape(hint));
      }
      section.push_str("</ul>\n");
    }
  }

  section.push_str("</section>\n");
  section
}

/// 错误页，仍然带上传表单以便重试
pub fn error_page(message: &str, options: &DetectOptions) -> String {
  let body = format!(
    "<p class=\"error\">{}</p>\n<hr>\n{}",
    escape(message),
    upload_form(options)
  );
  layout(&body)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    input::IngressError, output::tests::sample_report, pipeline::PipelineError,
    summary::Detection,
  };

  #[test]
  fn escapes_markup() {
    assert_eq!(
      escape("<b>\"tank\" & 'co'</b>"),
      "&lt;b&gt;&quot;tank&quot; &amp; &#39;co&#39;&lt;/b&gt;"
    );
  }

  #[test]
  fn upload_page_has_form() {
    let page = upload_page(&DetectOptions::default());
    assert!(page.contains(PAGE_TITLE));
    assert!(page.contains("name=\"file\""));
    assert!(page.contains("accept=\".jpg,.jpeg,.png\""));
    assert!(page.contains("value=\"0.50\""));
    assert!(page.contains(" checked"));
  }

  #[test]
  fn result_page_lists_counts() {
    let (report, _dir) = sample_report(&[
      ("OxygenTank", 0.9),
      ("OxygenTank", 0.8),
      ("Helmet", 0.7),
    ]);
    let page = result_page(
      &report,
      Some(ShownImage::Annotated("/scratch/a.png")),
      &DetectOptions::default(),
    );

    assert!(page.contains("Detection Summary"));
    assert!(page.contains("#ee82ee"));
    assert!(page.contains("✔ OxygenTank × 2"));
    assert!(page.contains("✔ Helmet × 1"));
    assert!(page.contains("Total objects detected: 3 (2 unique classes)"));
    assert!(page.contains("src=\"/scratch/a.png\""));
    assert!(page.contains("<figcaption>Detected objects</figcaption>"));
    assert!(page.contains("tank.png (64 x 48"));
    assert!(!page.contains(NO_DETECTION_MESSAGE));

    // 按类别名排序
    let helmet = page.find("Helmet ×").unwrap();
    let tank = page.find("OxygenTank ×").unwrap();
    assert!(helmet < tank);
  }

  #[test]
  fn empty_result_shows_hints() {
    let (report, _dir) = sample_report(&[]);
    let page = result_page(&report, None, &DetectOptions::default());

    assert!(page.contains(NO_DETECTION_MESSAGE));
    for hint in NO_DETECTION_HINTS {
      assert!(page.contains(&escape(hint)));
    }
    assert!(!page.contains("Total objects detected"));
    assert!(!page.contains("<img"));
  }

  #[test]
  fn uploaded_image_is_shown_without_annotation() {
    let (report, _dir) = sample_report(&[("Helmet", 0.7)]);
    let page = result_page(
      &report,
      Some(ShownImage::Uploaded("/scratch/2026/10/16/b.png")),
      &DetectOptions::default(),
    );

    assert!(page.contains("src=\"/scratch/2026/10/16/b.png\""));
    assert!(page.contains("<figcaption>Uploaded image</figcaption>"));
    assert!(!page.contains("Detected objects"));
  }

  #[test]
  fn class_names_are_escaped() {
    let (mut report, _dir) = sample_report(&[("Tank", 0.9)]);
    let detections = vec![Detection {
      class_name: "<script>".into(),
      ..report.detections.as_slice()[0].clone()
    }];
    report.detections = crate::summary::DetectionSet::filter(detections, 0.5);
    report.outcome = Outcome::from_set(&report.detections);

    let page = result_page(&report, None, &DetectOptions::default());
    assert!(page.contains("✔ &lt;script&gt; × 1"));
    assert!(!page.contains("<script>"));
  }

  #[test]
  fn error_page_shows_actionable_message() {
    let error = PipelineError::Ingress(IngressError::EmptyUpload);
    let page = error_page(error.user_message(), &DetectOptions::default());
    assert!(page.contains("The uploaded file is empty"));
    assert!(page.contains("name=\"file\""));
  }
}
