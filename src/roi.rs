// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/roi.rs - 手与琴颈交集的 ROI 选取
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

use serde::Serialize;
use tracing::debug;

use crate::config::DecisionConfig;
use crate::geometry::Rect;
use crate::model::DetectResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiState {
  Ok,
  FallbackFull,
  TooSmall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
  pub rect: Rect,
  pub state: RoiState,
}

impl Roi {
  pub fn is_usable(&self) -> bool {
    self.state != RoiState::TooSmall
  }
}

#[derive(Debug, Clone)]
pub struct RoiSelector {
  /// 交集占手部框面积的最小比例
  overlap_min: f64,
  expand_ratio: f64,
  /// 最终裁剪区域的最短边（像素）
  min_side: i32,
}

impl Default for RoiSelector {
  fn default() -> Self {
    Self::from(&DecisionConfig::default())
  }
}

impl From<&DecisionConfig> for RoiSelector {
  fn from(config: &DecisionConfig) -> Self {
    Self {
      overlap_min: config.roi_overlap_min,
      expand_ratio: config.roi_expand_ratio,
      min_side: config.roi_min_side,
    }
  }
}

impl RoiSelector {
  /// 在所有 (手, 琴颈) 组合中挑出交集面积最大者，外扩后返回
  ///
  /// 面积相同时保留先枚举到的组合；交集覆盖手部不足 `overlap_min` 的组合被丢弃。
  pub fn pick(&self, detections: &DetectResult) -> Option<Rect> {
    let hands = detections.items.iter().filter(|d| d.is_hand());
    let necks: Vec<_> = detections.items.iter().filter(|d| d.is_neck()).collect();

    let mut best: Option<(Rect, i64)> = None;
    for hand in hands {
      for neck in &necks {
        let Some(inter) = hand.bbox.intersect(&neck.bbox) else {
          continue;
        };
        if inter.overlap_ratio(&hand.bbox) < self.overlap_min {
          continue;
        }
        let area = inter.area();
        if best.is_none_or(|(_, best_area)| area > best_area) {
          best = Some((inter, area));
        }
      }
    }

    best.map(|(inter, _)| inter.expand(self.expand_ratio, detections.width, detections.height))
  }

  /// 选取 ROI；没有合格组合时退回整帧，最短边不足时标记为过小
  pub fn select(&self, detections: &DetectResult) -> Roi {
    let (rect, state) = match self.pick(detections) {
      Some(rect) => (rect, RoiState::Ok),
      None => (
        Rect::full_frame(detections.width, detections.height),
        RoiState::FallbackFull,
      ),
    };

    let state = if rect.min_side() < self.min_side {
      RoiState::TooSmall
    } else {
      state
    };
    debug!("ROI 选取结果: {:?} ({:?})", rect, state);
    Roi { rect, state }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectItem;

  fn det(name: &str, bbox: [i32; 4]) -> DetectItem {
    DetectItem {
      class_name: name.to_string(),
      bbox: bbox.into(),
      score: 0.9,
    }
  }

  fn frame(items: Vec<DetectItem>) -> DetectResult {
    DetectResult {
      width: 1000,
      height: 1000,
      items: items.into_boxed_slice(),
    }
  }

  #[test]
  fn quarter_coverage_is_accepted() {
    // 交集 (50,50,100,100) 覆盖手部 25%
    let detections = frame(vec![
      det("hand", [0, 0, 100, 100]),
      det("neck", [50, 50, 150, 150]),
    ]);
    let roi = RoiSelector::default().select(&detections);
    assert_eq!(roi.state, RoiState::Ok);
    assert_eq!(roi.rect, Rect::new(45, 45, 105, 105));
  }

  #[test]
  fn low_coverage_falls_back_to_full_frame() {
    // 交集 50x50 只覆盖 200x200 手部的 6.25%
    let detections = frame(vec![
      det("hand", [0, 0, 200, 200]),
      det("fretboard", [150, 150, 300, 300]),
    ]);
    let selector = RoiSelector::default();
    assert_eq!(selector.pick(&detections), None);
    let roi = selector.select(&detections);
    assert_eq!(roi.state, RoiState::FallbackFull);
    assert_eq!(roi.rect, Rect::full_frame(1000, 1000));
  }

  #[test]
  fn largest_area_wins_over_largest_ratio() {
    let detections = frame(vec![
      // 小手：交集完全覆盖，面积 400
      det("hand", [500, 500, 520, 520]),
      // 大手：交集覆盖 50%，面积 20000
      det("Hand", [0, 0, 200, 200]),
      det("neck", [0, 100, 1000, 600]),
    ]);
    let picked = RoiSelector::default().pick(&detections).unwrap();
    assert_eq!(picked, Rect::new(0, 100, 200, 200).expand(1.2, 1000, 1000));
  }

  #[test]
  fn equal_areas_keep_first_pair() {
    let detections = frame(vec![
      det("hand", [0, 0, 100, 100]),
      det("hand", [400, 400, 500, 500]),
      det("neck", [0, 0, 100, 100]),
      det("neck", [400, 400, 500, 500]),
    ]);
    let picked = RoiSelector::default().pick(&detections).unwrap();
    assert_eq!(picked, Rect::new(0, 0, 100, 100).expand(1.2, 1000, 1000));
  }

  #[test]
  fn tiny_frame_is_too_small() {
    let detections = DetectResult::empty(15, 200);
    let roi = RoiSelector::default().select(&detections);
    assert_eq!(roi.state, RoiState::TooSmall);
    assert!(!roi.is_usable());
  }

  #[test]
  fn no_detections_fall_back() {
    let roi = RoiSelector::default().select(&DetectResult::empty(640, 480));
    assert_eq!(roi.state, RoiState::FallbackFull);
    assert_eq!(roi.rect, Rect::new(0, 0, 639, 479));
  }
}
