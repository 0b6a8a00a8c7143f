// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio.rs - 音频和弦识别
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

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

mod chroma;
mod classifier;
mod hpss;
mod segment;
mod templates;
mod voter;

pub use self::chroma::{ChromaExtractor, StftChroma, normalize_columns};
pub use self::classifier::{AudioClassifier, ChunkClassification, rms_energy};
pub use self::hpss::harmonic_spectrum;
pub use self::segment::{
  Segment, SegmentConfig, enforce_min_run, frame_labels, majority_filter, segment_chroma,
  segment_recording, segments_by_beats, segments_by_runs,
};
pub use self::templates::{ChordTemplate, PITCH_CLASSES, TemplateBank, cosine_similarity};
pub use self::voter::AudioVoter;

const NO_CHORD: &str = "NC";

/// 音频判定标签，低能量或低置信度时为 `NC`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordLabel {
  Chord(&'static str),
  NoChord,
}

impl ChordLabel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChordLabel::Chord(label) => label,
      ChordLabel::NoChord => NO_CHORD,
    }
  }

  pub fn is_chord(&self) -> bool {
    matches!(self, ChordLabel::Chord(_))
  }
}

impl fmt::Display for ChordLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for ChordLabel {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

#[derive(Error, Debug)]
pub enum AudioError {
  #[error("采样率无效: {0}")]
  InvalidSampleRate(u32),
  #[error("色度矩阵应为 12 行，实际 {0} 行")]
  ChromaShape(usize),
  #[error("色度提取失败: {0}")]
  Extraction(String),
}
