// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/templates.rs - 12 个和弦的音级模板
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

use std::sync::OnceLock;

use ndarray::Array2;

pub const PITCH_CLASSES: usize = 12;

const EPS: f32 = 1e-9;

// 音级下标：C = 0 ... B = 11
const C: usize = 0;
const D: usize = 2;
const DS: usize = 3;
const E: usize = 4;
const FS: usize = 6;
const G: usize = 7;
const A: usize = 9;
const B: usize = 11;

/// 斜线和弦低音的额外权重
const SLASH_BASS_GAIN: f32 = 0.5;

struct ChordNotes {
  label: &'static str,
  notes: &'static [usize],
  bass: Option<(usize, f32)>,
}

const CHORD_NOTES: [ChordNotes; 12] = [
  ChordNotes { label: "Am", notes: &[A, C, E], bass: None },
  ChordNotes { label: "Am7", notes: &[A, C, E, G], bass: None },
  ChordNotes { label: "B", notes: &[B, DS, FS], bass: None },
  ChordNotes { label: "Bm", notes: &[B, D, FS], bass: None },
  ChordNotes { label: "C", notes: &[C, E, G], bass: None },
  ChordNotes { label: "Cadd9", notes: &[C, E, G, D], bass: None },
  ChordNotes { label: "D", notes: &[D, FS, A], bass: None },
  // D7 为基底，略加强低音 F#
  ChordNotes { label: "D7/F#", notes: &[D, FS, A, C], bass: Some((FS, SLASH_BASS_GAIN)) },
  ChordNotes { label: "Dsus4", notes: &[D, G, A], bass: None },
  ChordNotes { label: "Em", notes: &[E, G, B], bass: None },
  ChordNotes { label: "Em7", notes: &[E, G, B, D], bass: None },
  ChordNotes { label: "G", notes: &[G, B, D], bass: None },
];

/// L2 归一化的 12 维音级模板
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplate {
  label: &'static str,
  weights: [f32; PITCH_CLASSES],
}

impl ChordTemplate {
  fn build(chord: &ChordNotes) -> Self {
    let mut weights = [0f32; PITCH_CLASSES];
    for &note in chord.notes {
      weights[note] += 1.0;
    }
    if let Some((note, gain)) = chord.bass {
      weights[note] += gain;
    }
    l2_normalize(&mut weights);
    Self {
      label: chord.label,
      weights,
    }
  }

  pub fn label(&self) -> &'static str {
    self.label
  }

  pub fn weights(&self) -> &[f32; PITCH_CLASSES] {
    &self.weights
  }
}

pub(crate) fn l2_normalize(v: &mut [f32]) {
  let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
  for x in v.iter_mut() {
    *x /= norm + EPS;
  }
}

pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f32 {
  let dot: f32 = u.iter().zip(v).map(|(a, b)| a * b).sum();
  let nu = u.iter().map(|x| x * x).sum::<f32>().sqrt();
  let nv = v.iter().map(|x| x * x).sum::<f32>().sqrt();
  dot / (nu * nv + EPS)
}

/// 模板库，构建后不再修改
#[derive(Debug, Clone)]
pub struct TemplateBank {
  templates: Box<[ChordTemplate]>,
}

impl Default for TemplateBank {
  fn default() -> Self {
    Self::new()
  }
}

impl TemplateBank {
  pub fn new() -> Self {
    Self {
      templates: CHORD_NOTES.iter().map(ChordTemplate::build).collect(),
    }
  }

  /// 进程内共享的模板库
  pub fn standard() -> &'static TemplateBank {
    static BANK: OnceLock<TemplateBank> = OnceLock::new();
    BANK.get_or_init(TemplateBank::new)
  }

  pub fn len(&self) -> usize {
    self.templates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.templates.is_empty()
  }

  pub fn templates(&self) -> &[ChordTemplate] {
    &self.templates
  }

  pub fn label(&self, index: usize) -> Option<&'static str> {
    self.templates.get(index).map(ChordTemplate::label)
  }

  /// 与全部模板的余弦相似度中最大者，相同时取靠前的模板
  pub fn best_match(&self, chroma: &[f32; PITCH_CLASSES]) -> (&'static str, f32) {
    let mut best = (self.templates[0].label, f32::NEG_INFINITY);
    for template in self.templates.iter() {
      let sim = cosine_similarity(chroma, &template.weights);
      if sim > best.1 {
        best = (template.label, sim);
      }
    }
    best
  }

  /// 模板矩阵，形状 [K, 12]
  pub fn matrix(&self) -> Array2<f32> {
    Array2::from_shape_fn((self.templates.len(), PITCH_CLASSES), |(k, p)| {
      self.templates[k].weights[p]
    })
  }
}
