// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/model/yolo.rs - 基于 ONNX Runtime 的 YOLO 检测模型
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

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{RgbImage, imageops::FilterType};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, InferParams, LabelTable, Model, ModelError},
};

pub const YOLO_SCHEME: &str = "yolo";

const YOLO_BOX_FEATURES: usize = 4;
const YOLO_DEFAULT_THREADS: usize = 4;
const YOLO_METADATA_NAMES: &str = "names";

/// Ultralytics YOLOv8 / YOLO11 检测模型导出的 ONNX 文件。
///
/// 输出张量为 `[1, 4 + C, N]`（也兼容 `[1, N, 4 + C]`），
/// 前四个特征是输入尺度下的 `cx, cy, w, h`，其余是各类别得分。
#[derive(Debug)]
pub struct YoloModel {
  name: String,
  session: Mutex<Session>,
  labels: LabelTable,
}

pub struct YoloBuilder {
  model_path: PathBuf,
  threads: usize,
  labels: Option<LabelTable>,
}

impl FromUrlWithScheme for YoloBuilder {
  const SCHEME: &'static str = YOLO_SCHEME;
}

impl FromUrl for YoloBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::SchemeMismatch {
        expected: Self::SCHEME,
        found: url.scheme().to_string(),
      });
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| ModelError::Unavailable(format!("模型路径编码错误: {e}")))?;
    let mut builder = YoloBuilder::new(path.as_ref());

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "threads" => match value.parse() {
          Ok(threads) => builder = builder.threads(threads),
          Err(_) => warn!("忽略无效的线程数: {}", value),
        },
        "labels" => builder = builder.labels(LabelTable::from_toml_file(value.as_ref())?),
        _ => warn!("忽略未知的模型参数: {}={}", key, value),
      }
    }

    Ok(builder)
  }
}

impl YoloBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      threads: YOLO_DEFAULT_THREADS,
      labels: None,
    }
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads.max(1);
    self
  }

  /// 指定标签表，优先于模型元数据
  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn build(self) -> Result<YoloModel, ModelError> {
    let path = self.model_path.display().to_string();
    info!("加载模型文件: {}", path);

    if !self.model_path.is_file() {
      return Err(ModelError::Unavailable(format!("模型文件不存在: {path}")));
    }

    let unavailable = |e: &dyn std::fmt::Display| ModelError::Unavailable(format!("{path}: {e}"));
    let builder = Session::builder().map_err(|e| unavailable(&e))?;
    let builder = builder
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| unavailable(&e))?;
    let builder = builder
      .with_intra_threads(self.threads)
      .map_err(|e| unavailable(&e))?;
    let session = builder
      .commit_from_file(&self.model_path)
      .map_err(|e| unavailable(&e))?;

    let labels = self
      .labels
      .or_else(|| labels_from_metadata(&session))
      .unwrap_or_default();
    if labels.is_empty() {
      warn!("模型元数据中没有类别名称，将以编号显示");
    } else {
      debug!("类别数量: {}", labels.len());
    }

    let name = model_name(&self.model_path);
    info!("模型加载完成: {}", name);

    Ok(YoloModel {
      name,
      session: Mutex::new(session),
      labels,
    })
  }
}

fn labels_from_metadata(session: &Session) -> Option<LabelTable> {
  let metadata = session.metadata().ok()?;
  let raw = metadata.custom(YOLO_METADATA_NAMES).ok().flatten()?;
  LabelTable::from_ultralytics_metadata(&raw)
}

fn model_name(path: &Path) -> String {
  path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "yolo".to_string())
}

impl YoloModel {
  /// 缩放到 `size x size`，归一化到 [0, 1]，排成 NCHW
  fn preprocess(image: &RgbImage, size: u32) -> Vec<f32> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let plane = (size as usize) * (size as usize);
    let mut input = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y as usize) * (size as usize) + (x as usize);
      input[idx] = pixel[0] as f32 / 255.0;
      input[plane + idx] = pixel[1] as f32 / 255.0;
      input[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }
    input
  }

  /// 模型坐标到原图坐标的缩放比例 `(x, y)`
  fn scale_factors(image: &RgbImage, size: u32) -> (f32, f32) {
    (
      image.width() as f32 / size as f32,
      image.height() as f32 / size as f32,
    )
  }
}

impl Model for YoloModel {
  type Error = ModelError;

  fn name(&self) -> &str {
    &self.name
  }

  fn labels(&self) -> &LabelTable {
    &self.labels
  }

  fn infer(&self, image: &RgbImage, params: &InferParams) -> Result<DetectResult, Self::Error> {
    let size = params.image_size;
    debug!("预处理: {}x{} -> {}x{}", image.width(), image.height(), size, size);
    let input = Self::preprocess(image, size);
    let shape = vec![1i64, 3, size as i64, size as i64];
    let tensor =
      Tensor::from_array((shape, input)).map_err(|e| ModelError::Inference(e.to_string()))?;

    let scale = Self::scale_factors(image, size);

    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::Inference("推理会话锁已损坏".to_string()))?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![tensor])
      .map_err(|e| ModelError::Inference(e.to_string()))?;
    let (shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    debug!("模型输出形状: {:?}", dims);

    let items = postprocess(&dims, data, params, scale)?;
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

/// 解码输出张量：取每个候选框的最高类别得分，按阈值筛选，
/// 换算回原图坐标后做按类别的 NMS，结果按得分降序
pub(crate) fn postprocess(
  dims: &[usize],
  data: &[f32],
  params: &InferParams,
  scale: (f32, f32),
) -> Result<Vec<DetectItem>, ModelError> {
  let [batch, d1, d2] = dims else {
    return Err(ModelError::InvalidOutput(format!(
      "期望三维输出，实际为 {dims:?}"
    )));
  };
  if *batch != 1 || d1 * d2 != data.len() {
    return Err(ModelError::InvalidOutput(format!(
      "输出形状 {dims:?} 与数据长度 {} 不符",
      data.len()
    )));
  }

  // 特征维通常远小于候选框数量
  let channels_first = d1 <= d2;
  let (features, candidates) = if channels_first { (*d1, *d2) } else { (*d2, *d1) };
  if features <= YOLO_BOX_FEATURES {
    return Err(ModelError::InvalidOutput(format!(
      "特征维度 {features} 不足以包含类别得分"
    )));
  }

  let at = |feature: usize, candidate: usize| {
    if channels_first {
      data[feature * candidates + candidate]
    } else {
      data[candidate * features + feature]
    }
  };

  let mut items = Vec::new();
  for i in 0..candidates {
    let (class_id, score) = (YOLO_BOX_FEATURES..features)
      .map(|f| (f - YOLO_BOX_FEATURES, at(f, i)))
      .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
      .unwrap_or((0, f32::MIN));

    if !(score >= params.confidence) {
      continue;
    }

    let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
    items.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox: [
        (cx - w / 2.0) * scale.0,
        (cy - h / 2.0) * scale.1,
        (cx + w / 2.0) * scale.0,
        (cy + h / 2.0) * scale.1,
      ],
    });
  }

  Ok(non_max_suppression(items, params.nms_threshold))
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = inter_w * inter_h;
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 同类别内贪心抑制重叠框
fn non_max_suppression(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut keep: Vec<DetectItem> = Vec::with_capacity(items.len());
  for item in items {
    let suppressed = keep
      .iter()
      .any(|kept| kept.class_id == item.class_id && iou(&kept.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      keep.push(item);
    }
  }
  keep
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARAMS: InferParams = InferParams {
    confidence: 0.5,
    nms_threshold: 0.45,
    image_size: 640,
  };

  /// 构造 `[1, 4 + classes, N]` 排布的输出，不足 16 个候选框时补零
  fn channels_first(candidates: &[([f32; 4], Vec<f32>)]) -> (Vec<usize>, Vec<f32>) {
    let classes = candidates[0].1.len();
    let features = 4 + classes;
    let n = candidates.len().max(16);
    let mut data = vec![0.0; features * n];
    for (i, (bbox, scores)) in candidates.iter().enumerate() {
      for f in 0..4 {
        data[f * n + i] = bbox[f];
      }
      for (c, score) in scores.iter().enumerate() {
        data[(4 + c) * n + i] = *score;
      }
    }
    (vec![1, features, n], data)
  }

  fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
  }

  #[test]
  fn preprocess_lays_out_planar_rgb() {
    let image = RgbImage::from_fn(2, 2, |x, y| {
      let base = (y * 2 + x) as u8 * 30;
      image::Rgb([base + 10, base + 20, base + 30])
    });
    let input = YoloModel::preprocess(&image, 2);

    let plane = 4;
    assert_eq!(input.len(), 3 * plane);
    // (0, 0)
    assert!(close(input[0], 10.0 / 255.0));
    assert!(close(input[plane], 20.0 / 255.0));
    assert!(close(input[2 * plane], 30.0 / 255.0));
    // (1, 0) 紧随其后，(0, 1) 在下一行
    assert!(close(input[1], 40.0 / 255.0));
    assert!(close(input[plane + 1], 50.0 / 255.0));
    assert!(close(input[2 * plane + 1], 60.0 / 255.0));
    assert!(close(input[2], 70.0 / 255.0));
    assert!(close(input[2 * plane + 3], 120.0 / 255.0));
    assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn preprocess_resizes_to_square_input() {
    let image = RgbImage::from_pixel(64, 32, image::Rgb([255, 0, 128]));
    let input = YoloModel::preprocess(&image, 16);

    let plane = 16 * 16;
    assert_eq!(input.len(), 3 * plane);
    assert!(input[..plane].iter().all(|v| close(*v, 1.0)));
    assert!(input[plane..2 * plane].iter().all(|v| close(*v, 0.0)));
    assert!(input[2 * plane..].iter().all(|v| close(*v, 128.0 / 255.0)));

    assert_eq!(YoloModel::scale_factors(&image, 16), (4.0, 2.0));
  }

  #[test]
  fn decodes_and_scales_boxes() {
    let (dims, data) = channels_first(&[
      ([100.0, 100.0, 40.0, 20.0], vec![0.9, 0.1]),
      ([300.0, 300.0, 10.0, 10.0], vec![0.2, 0.3]),
    ]);
    let items = postprocess(&dims, &data, &PARAMS, (2.0, 0.5)).unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 0);
    assert_eq!(items[0].score, 0.9);
    assert_eq!(items[0].bbox, [160.0, 45.0, 240.0, 55.0]);
  }

  #[test]
  fn accepts_candidate_major_layout() {
    // [1, N, 4 + C]，N = 8 大于特征数 6
    let features = 6;
    let n = 8;
    let mut data = vec![0.0; n * features];
    data[3 * features..4 * features].copy_from_slice(&[50.0, 50.0, 10.0, 10.0, 0.1, 0.8]);
    let items = postprocess(&[1, n, features], &data, &PARAMS, (1.0, 1.0)).unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 1);
    assert_eq!(items[0].bbox, [45.0, 45.0, 55.0, 55.0]);
  }

  #[test]
  fn suppresses_overlaps_within_a_class_only() {
    let (dims, data) = channels_first(&[
      ([100.0, 100.0, 50.0, 50.0], vec![0.9, 0.0]),
      ([102.0, 101.0, 50.0, 50.0], vec![0.8, 0.0]),
      ([101.0, 100.0, 50.0, 50.0], vec![0.0, 0.7]),
      ([400.0, 400.0, 50.0, 50.0], vec![0.6, 0.0]),
    ]);
    let items = postprocess(&dims, &data, &PARAMS, (1.0, 1.0)).unwrap();

    let summary: Vec<_> = items.iter().map(|i| (i.class_id, i.score)).collect();
    assert_eq!(summary, vec![(0, 0.9), (1, 0.7), (0, 0.6)]);
  }

  #[test]
  fn rejects_malformed_output() {
    assert!(matches!(
      postprocess(&[1, 84], &[0.0; 84], &PARAMS, (1.0, 1.0)),
      Err(ModelError::InvalidOutput(_))
    ));
    assert!(matches!(
      postprocess(&[1, 4, 10], &[0.0; 40], &PARAMS, (1.0, 1.0)),
      Err(ModelError::InvalidOutput(_))
    ));
    assert!(matches!(
      postprocess(&[1, 6, 10], &[0.0; 5], &PARAMS, (1.0, 1.0)),
      Err(ModelError::InvalidOutput(_))
    ));
  }

  #[test]
  fn missing_weights_are_unavailable() {
    let result = YoloBuilder::new("/definitely/not/here/best.onnx").build();
    assert!(matches!(result, Err(ModelError::Unavailable(_))));
  }

  #[test]
  fn builder_from_url() {
    let url = Url::parse("yolo:///models/best%20v2.onnx?threads=2").unwrap();
    let builder = YoloBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, PathBuf::from("/models/best v2.onnx"));
    assert_eq!(builder.threads, 2);

    let url = Url::parse("rknn:///models/best.onnx").unwrap();
    assert!(matches!(
      YoloBuilder::from_url(&url),
      Err(ModelError::SchemeMismatch { .. })
    ));
  }
}
