// 该文件是 Tiangong （天宫哨兵） 项目的一部分。
// src/model/handle.rs - 已加载模型的持有者
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

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

/// 进程内唯一的模型槽位。
///
/// 启动时构造一次并注入流水线；请求只拿到 `Arc<M>` 的克隆，
/// 因此 `replace` 与 `teardown` 不会打断正在进行的推理。
/// `teardown` 之后 `current` 返回 `None`，调用方应报告模型不可用。
pub struct ModelHandle<M> {
  slot: RwLock<Option<Arc<M>>>,
}

impl<M> ModelHandle<M> {
  pub fn new(model: M) -> Self {
    Self {
      slot: RwLock::new(Some(Arc::new(model))),
    }
  }

  /// 没有模型的空槽位
  pub fn empty() -> Self {
    Self {
      slot: RwLock::new(None),
    }
  }

  pub fn current(&self) -> Option<Arc<M>> {
    match self.slot.read() {
      Ok(slot) => slot.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.current().is_some()
  }

  /// 换入新模型（重新加载），返回旧模型
  pub fn replace(&self, model: M) -> Option<Arc<M>> {
    info!("替换已加载的模型");
    self.swap(Some(Arc::new(model)))
  }

  /// 释放模型，返回被释放的模型
  pub fn teardown(&self) -> Option<Arc<M>> {
    warn!("释放模型，后续请求将报告模型不可用");
    self.swap(None)
  }

  fn swap(&self, next: Option<Arc<M>>) -> Option<Arc<M>> {
    let mut slot = match self.slot.write() {
      Ok(slot) => slot,
      Err(poisoned) => poisoned.into_inner(),
    };
    std::mem::replace(&mut *slot, next)
  }
}
