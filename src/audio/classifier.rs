// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/classifier.rs - 能量门限与模板匹配的单段和弦分类
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

use ndarray::{Array2, Axis};
use serde::Serialize;
use tracing::debug;

use super::chroma::{ChromaExtractor, normalize_columns};
use super::templates::{PITCH_CLASSES, TemplateBank, l2_normalize};
use super::{AudioError, ChordLabel};
use crate::config::DecisionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkClassification {
  pub label: ChordLabel,
  pub confidence: f32,
  pub energy: f32,
}

impl ChunkClassification {
  fn no_chord(energy: f32) -> Self {
    Self {
      label: ChordLabel::NoChord,
      confidence: 0.0,
      energy,
    }
  }
}

/// 均方根能量
pub fn rms_energy(samples: &[f32]) -> f32 {
  if samples.is_empty() {
    return 0.0;
  }
  (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

pub struct AudioClassifier<E> {
  extractor: E,
  bank: &'static TemplateBank,
  energy_gate: f32,
}

impl<E: ChromaExtractor> AudioClassifier<E> {
  pub fn new(extractor: E, config: &DecisionConfig) -> Self {
    Self {
      extractor,
      bank: TemplateBank::standard(),
      energy_gate: config.energy_gate,
    }
  }

  pub fn with_energy_gate(mut self, energy_gate: f32) -> Self {
    self.energy_gate = energy_gate;
    self
  }

  pub fn extractor(&self) -> &E {
    &self.extractor
  }

  /// 对一段单声道音频分类
  ///
  /// 去直流后能量低于门限直接返回 `NC`，门限本身算通过。
  pub fn classify(
    &self,
    samples: &[f32],
    sample_rate: u32,
  ) -> Result<ChunkClassification, AudioError> {
    if samples.is_empty() {
      return Ok(ChunkClassification::no_chord(0.0));
    }

    let mean = samples.iter().sum::<f32>() / samples.len() as f32;
    let centered: Vec<f32> = samples.iter().map(|x| x - mean).collect();
    let energy = rms_energy(&centered);
    if energy < self.energy_gate {
      debug!("能量 {:.4} 低于门限 {:.4}，跳过和弦分析", energy, self.energy_gate);
      return Ok(ChunkClassification::no_chord(energy));
    }

    let chroma = self.extractor.extract(&centered, sample_rate)?;
    match self.match_chroma(chroma)? {
      Some((label, confidence)) => Ok(ChunkClassification {
        label: ChordLabel::Chord(label),
        confidence,
        energy,
      }),
      None => Ok(ChunkClassification::no_chord(energy)),
    }
  }

  /// 逐帧归一化后取时间均值，再与模板比较；没有帧时返回 None
  pub fn match_chroma(
    &self,
    mut chroma: Array2<f32>,
  ) -> Result<Option<(&'static str, f32)>, AudioError> {
    if chroma.nrows() != PITCH_CLASSES {
      return Err(AudioError::ChromaShape(chroma.nrows()));
    }
    if chroma.ncols() == 0 {
      return Ok(None);
    }
    normalize_columns(&mut chroma);

    let mut mean = [0f32; PITCH_CLASSES];
    if let Some(m) = chroma.mean_axis(Axis(1)) {
      for (slot, v) in mean.iter_mut().zip(m.iter()) {
        *slot = *v;
      }
    }
    l2_normalize(&mut mean);

    let (label, sim) = self.bank.best_match(&mean);
    debug!("模板匹配结果: {} ({:.3})", label, sim);
    Ok(Some((label, sim)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// 固定返回 C 大三和弦色度的提取器
  struct FixedChroma;

  impl ChromaExtractor for FixedChroma {
    fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Array2<f32>, AudioError> {
      Ok(Array2::from_shape_fn((12, 4), |(p, _)| match p {
        0 | 4 | 7 => 1.0,
        _ => 0.01,
      }))
    }
  }

  struct WrongShape;

  impl ChromaExtractor for WrongShape {
    fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Array2<f32>, AudioError> {
      Ok(Array2::zeros((11, 4)))
    }
  }

  fn square(amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
      .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
      .collect()
  }

  #[test]
  fn silence_is_no_chord() {
    let classifier = AudioClassifier::new(FixedChroma, &DecisionConfig::default());
    let result = classifier.classify(&vec![0.0; 44100], 44100).unwrap();
    assert_eq!(result, ChunkClassification::no_chord(0.0));
    assert_eq!(result.label.as_str(), "NC");
  }

  #[test]
  fn dc_offset_alone_does_not_pass_gate() {
    let classifier = AudioClassifier::new(FixedChroma, &DecisionConfig::default());
    let result = classifier.classify(&vec![0.5; 1000], 44100).unwrap();
    assert_eq!(result.label, ChordLabel::NoChord);
    assert_eq!(result.energy, 0.0);
  }

  #[test]
  fn energy_at_gate_is_analyzed() {
    // ±0.5 方波的能量恰为 0.5
    let classifier =
      AudioClassifier::new(FixedChroma, &DecisionConfig::default()).with_energy_gate(0.5);
    let result = classifier.classify(&square(0.5, 4), 44100).unwrap();
    assert_eq!(result.energy, 0.5);
    assert_eq!(result.label, ChordLabel::Chord("C"));
    assert!(result.confidence > 0.95);
  }

  #[test]
  fn default_gate_boundary_is_analyzed() {
    // 两点方波的均方根与幅值逐位相等，恰好落在默认门限 0.02 上
    let classifier = AudioClassifier::new(FixedChroma, &DecisionConfig::default());
    let result = classifier.classify(&square(0.02, 2), 44100).unwrap();
    assert_eq!(result.energy, 0.02);
    assert_eq!(result.label, ChordLabel::Chord("C"));

    let below = classifier.classify(&square(0.0199, 2), 44100).unwrap();
    assert_eq!(below.label, ChordLabel::NoChord);
  }

  #[test]
  fn energy_below_gate_is_skipped() {
    let classifier = AudioClassifier::new(FixedChroma, &DecisionConfig::default());
    let result = classifier.classify(&square(0.01, 100), 44100).unwrap();
    assert_eq!(result.label, ChordLabel::NoChord);
    assert!((result.energy - 0.01).abs() < 1e-6);
  }

  #[test]
  fn malformed_chroma_is_an_error() {
    let classifier = AudioClassifier::new(WrongShape, &DecisionConfig::default());
    assert!(matches!(
      classifier.classify(&square(0.5, 8), 44100),
      Err(AudioError::ChromaShape(11))
    ));
  }

  #[test]
  fn empty_chroma_yields_no_chord() {
    let classifier = AudioClassifier::new(FixedChroma, &DecisionConfig::default());
    assert_eq!(classifier.match_chroma(Array2::zeros((12, 0))).unwrap(), None);
  }
}
