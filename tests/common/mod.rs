mod fixtures;
pub use fixtures::*;

pub use tiangong::{
  config::DetectOptions,
  input::{ScratchDir, UploadedImage},
  model::{LabelTable, ModelHandle},
  pipeline::{Pipeline, PipelineError, Report},
  summary::Outcome,
};
