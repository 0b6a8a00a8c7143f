// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/response.rs - 对外结果结构
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

//! 字段名与客户端约定一致，序列化后即为 JSON 响应体。

use serde::Serialize;

use crate::audio::ChordLabel;
use crate::geometry::Rect;
use crate::label::CANONICAL_LABELS;
use crate::roi::{Roi, RoiState};

/// ROI 的左上角与宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoiReport {
  pub x: i32,
  pub y: i32,
  pub w: i32,
  pub h: i32,
}

impl From<&Rect> for RoiReport {
  fn from(rect: &Rect) -> Self {
    Self {
      x: rect.x1,
      y: rect.y1,
      w: rect.x2 - rect.x1,
      h: rect.y2 - rect.y1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopKEntry {
  pub label: String,
  pub prob: f32,
}

/// 单帧视觉判定结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePrediction {
  pub label: String,
  pub confidence: f32,
  #[serde(rename = "maj_label")]
  pub majority_label: Option<String>,
  #[serde(rename = "maj_confidence")]
  pub majority_confidence: Option<f32>,
  /// 未给出目标和弦时为 None
  pub is_correct: Option<bool>,
  #[serde(rename = "is_correct_maj")]
  pub is_correct_majority: Option<bool>,
  pub score_event: bool,
  #[serde(rename = "topk")]
  pub top_k: Vec<TopKEntry>,
  pub roi: RoiReport,
  pub roi_state: RoiState,
  pub inference_ms: u64,
}

/// ROI 过小时的拒绝结果，不视为错误
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiRejection {
  pub error: &'static str,
  pub roi: RoiReport,
  pub roi_state: RoiState,
  pub inference_ms: u64,
}

impl RoiRejection {
  pub const CODE: &'static str = "roi_too_small";

  pub fn new(roi: &Roi, inference_ms: u64) -> Self {
    Self {
      error: Self::CODE,
      roi: RoiReport::from(&roi.rect),
      roi_state: RoiState::TooSmall,
      inference_ms,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioChunkResult {
  pub chord: ChordLabel,
  pub conf: f32,
  pub energy: f32,
  pub vote: ChordLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
  pub status: &'static str,
  pub classes: usize,
  pub canon_labels: &'static [&'static str],
}

impl HealthReport {
  pub fn ok(classes: usize) -> Self {
    Self {
      status: "ok",
      classes,
      canon_labels: &CANONICAL_LABELS,
    }
  }
}
