use std::{io::Cursor, sync::Arc};

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use tiangong::{
  input::ScratchDir,
  model::{DetectItem, DetectResult, InferParams, LabelTable, Model, ModelHandle},
  pipeline::Pipeline,
};

pub const TILE: u32 = 32;
pub const BOUNDARY: &str = "tiangong-test-boundary";

pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// 红色图块识别为 OxygenTank，绿色通道是置信度
pub fn tank(confidence: f32) -> Rgb<u8> {
  Rgb([255, (confidence * 255.0).round() as u8, 0])
}

/// 蓝色图块识别为 Helmet，绿色通道是置信度
pub fn helmet(confidence: f32) -> Rgb<u8> {
  Rgb([0, (confidence * 255.0).round() as u8, 255])
}

#[derive(Error, Debug)]
#[error("fixture model never fails")]
pub struct FixtureError;

/// 按颜色识别横向排列的 32x32 图块，结果完全确定
pub struct TileModel {
  labels: LabelTable,
}

impl TileModel {
  pub fn new() -> Self {
    Self {
      labels: LabelTable::from_names(["OxygenTank", "Helmet"]),
    }
  }
}

impl Model for TileModel {
  type Error = FixtureError;

  fn name(&self) -> &str {
    "fixture"
  }

  fn labels(&self) -> &LabelTable {
    &self.labels
  }

  fn infer(&self, image: &RgbImage, _: &InferParams) -> Result<DetectResult, Self::Error> {
    let mut items = Vec::new();
    for tile in 0..image.width() / TILE {
      let x = tile * TILE;
      let Rgb([r, g, b]) = *image.get_pixel(x + TILE / 2, TILE / 2);
      let class_id = match (r >= 128, b >= 128) {
        (true, false) => 0,
        (false, true) => 1,
        _ => continue,
      };
      items.push(DetectItem {
        class_id,
        score: g as f32 / 255.0,
        bbox: [x as f32, 0.0, (x + TILE) as f32, TILE as f32],
      });
    }
    Ok(DetectResult::from(items))
  }
}

pub fn tiles_image(tiles: &[Rgb<u8>]) -> RgbImage {
  let width = TILE * tiles.len().max(1) as u32;
  RgbImage::from_fn(width, TILE, |x, _| {
    tiles
      .get((x / TILE) as usize)
      .copied()
      .unwrap_or(BACKGROUND)
  })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
  let mut buffer = Cursor::new(Vec::new());
  image
    .write_to(&mut buffer, format)
    .expect("Failed to encode test image");
  buffer.into_inner()
}

pub fn tiles_png(tiles: &[Rgb<u8>]) -> Vec<u8> {
  encode(&tiles_image(tiles), ImageFormat::Png)
}

/// 两个 OxygenTank 和一个 Helmet，中间夹一块背景
pub fn station_scene() -> Vec<u8> {
  tiles_png(&[tank(0.9), BACKGROUND, tank(0.8), helmet(0.7)])
}

/// Creates a pipeline over a fresh scratch directory.
/// The temp directory must be kept alive for the duration of the test.
pub fn create_test_pipeline() -> (Arc<Pipeline<TileModel>>, tempfile::TempDir) {
  let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
  let scratch = ScratchDir::new(dir.path().join("uploads")).expect("Failed to create scratch dir");
  let handle = Arc::new(ModelHandle::new(TileModel::new()));
  let pipeline = Pipeline::new(handle, scratch).expect("Failed to create pipeline");
  (Arc::new(pipeline), dir)
}

/// 构造 `multipart/form-data` 请求体，返回 `(Content-Type, body)`
pub fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> (String, Vec<u8>) {
  let mut body = Vec::new();

  for (name, value) in fields {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
      format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
    );
  }

  if let Some((filename, bytes)) = file {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
      format!(
        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
      )
      .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
  }

  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
  (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
