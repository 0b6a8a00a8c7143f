// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/model.rs - 外部模型接口：目标检测与和弦分类
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Rect;

/// 推理模型。检测器输出 [`DetectResult`]，分类器输出 [`ClassProbabilities`]。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectItem {
  pub class_name: String,
  pub bbox: Rect, // [x_min, y_min, x_max, y_max]，像素坐标
  #[serde(default)]
  pub score: f32,
}

impl DetectItem {
  pub fn is_hand(&self) -> bool {
    self.class_name.to_lowercase().contains("hand")
  }

  pub fn is_neck(&self) -> bool {
    let name = self.class_name.to_lowercase();
    name.contains("fret") || name.contains("neck")
  }
}

/// 单帧检测集合，附带原图尺寸
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectResult {
  pub width: u32,
  pub height: u32,
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn empty(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      items: Box::new([]),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum ProbabilityError {
  #[error("概率向量为空")]
  Empty,
  #[error("概率向量含有非有限值，位置 {0}")]
  NotFinite(usize),
  #[error("概率向量不在单纯形上: 位置 {negative:?} 为负，总和 {sum}")]
  NotSimplex { negative: Option<usize>, sum: f32 },
}

/// 概率总和允许偏离 1 的幅度
pub const SIMPLEX_TOLERANCE: f32 = 1e-3;

/// 分类器输出的类别概率，下标与标签词表一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities {
  probs: Box<[f32]>,
}

impl TryFrom<Vec<f32>> for ClassProbabilities {
  type Error = ProbabilityError;

  fn try_from(probs: Vec<f32>) -> Result<Self, Self::Error> {
    if probs.is_empty() {
      return Err(ProbabilityError::Empty);
    }
    if let Some(pos) = probs.iter().position(|p| !p.is_finite()) {
      return Err(ProbabilityError::NotFinite(pos));
    }
    let negative = probs.iter().position(|&p| p < 0.0);
    let sum: f32 = probs.iter().sum();
    if negative.is_some() || (sum - 1.0).abs() > SIMPLEX_TOLERANCE {
      return Err(ProbabilityError::NotSimplex { negative, sum });
    }
    Ok(Self {
      probs: probs.into_boxed_slice(),
    })
  }
}

impl ClassProbabilities {
  /// 由 logits 做 softmax 得到
  pub fn from_logits(logits: &[f32]) -> Result<Self, ProbabilityError> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Self::try_from(exps.into_iter().map(|e| e / sum).collect::<Vec<_>>())
  }

  pub fn len(&self) -> usize {
    self.probs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.probs.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.probs
  }

  /// 最大概率的下标与概率，多个最大值时取最靠前的
  pub fn argmax(&self) -> (usize, f32) {
    let mut best = (0usize, self.probs[0]);
    for (idx, &p) in self.probs.iter().enumerate().skip(1) {
      if p > best.1 {
        best = (idx, p);
      }
    }
    best
  }

  /// 概率降序的前 k 项，同概率时下标小者在前
  pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = self.probs.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
  }
}
