// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/voter.rs - 音频分段结果的滑动窗口投票
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

use super::{ChordLabel, ChunkClassification};
use crate::config::DecisionConfig;
use crate::vote::VoteWindow;

#[derive(Debug, Clone)]
pub struct AudioVoter {
  window: VoteWindow<ChordLabel>,
  confidence_min: f32,
  energy_gate: f32,
}

impl AudioVoter {
  pub fn new(config: &DecisionConfig) -> Self {
    Self {
      window: VoteWindow::new(config.audio_vote_window),
      confidence_min: config.audio_confidence_min,
      energy_gate: config.energy_gate,
    }
  }

  /// 置信度与能量都达标才算一票和弦，否则记为 `NC`
  pub fn ballot(&self, classification: &ChunkClassification) -> ChordLabel {
    if classification.confidence >= self.confidence_min && classification.energy >= self.energy_gate
    {
      classification.label
    } else {
      ChordLabel::NoChord
    }
  }

  /// 投入一票并返回当前窗口的多数决
  pub fn push(&mut self, classification: &ChunkClassification) -> ChordLabel {
    let ballot = self.ballot(classification);
    self.window.push(ballot);
    self.window.majority().map(|m| m.value).unwrap_or(ballot)
  }

  pub fn len(&self) -> usize {
    self.window.len()
  }

  pub fn is_empty(&self) -> bool {
    self.window.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunk(label: &'static str, confidence: f32, energy: f32) -> ChunkClassification {
    ChunkClassification {
      label: ChordLabel::Chord(label),
      confidence,
      energy,
    }
  }

  #[test]
  fn weak_chunks_vote_no_chord() {
    let voter = AudioVoter::new(&DecisionConfig::default());
    assert_eq!(voter.ballot(&chunk("G", 0.29, 0.5)), ChordLabel::NoChord);
    assert_eq!(voter.ballot(&chunk("G", 0.9, 0.019)), ChordLabel::NoChord);
    assert_eq!(voter.ballot(&chunk("G", 0.3, 0.02)), ChordLabel::Chord("G"));
  }

  #[test]
  fn window_majority_smooths_outliers() {
    let mut voter = AudioVoter::new(&DecisionConfig::default());
    assert_eq!(voter.push(&chunk("Em", 0.8, 0.1)), ChordLabel::Chord("Em"));
    assert_eq!(voter.push(&chunk("G", 0.8, 0.1)), ChordLabel::Chord("Em"));
    assert_eq!(voter.push(&chunk("G", 0.8, 0.1)), ChordLabel::Chord("G"));
    assert_eq!(voter.push(&chunk("Em", 0.1, 0.1)), ChordLabel::Chord("G"));
  }

  #[test]
  fn window_keeps_last_five() {
    let mut voter = AudioVoter::new(&DecisionConfig::default());
    for _ in 0..3 {
      voter.push(&chunk("C", 0.9, 0.1));
    }
    for _ in 0..3 {
      voter.push(&chunk("D", 0.9, 0.1));
    }
    assert_eq!(voter.len(), 5);
    assert_eq!(voter.push(&chunk("Am", 0.9, 0.1)), ChordLabel::Chord("D"));
  }
}
