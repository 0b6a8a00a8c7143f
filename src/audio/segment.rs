// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/segment.rs - 整段录音的和弦分段
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

//! 流程：逐帧模板匹配 → 多数滤波 → 最短段合并 → 按连续段或节拍输出。

use std::hash::Hash;

use ndarray::{Array2, Axis};
use serde::Serialize;
use tracing::{debug, info};

use super::AudioError;
use super::chroma::{ChromaExtractor, normalize_columns};
use super::templates::{PITCH_CLASSES, TemplateBank};
use crate::config::DecisionConfig;
use crate::vote::mode_first_seen;

/// 一段 [start, end) 秒内的和弦
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
  pub start: f64,
  pub end: f64,
  pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentConfig {
  pub sample_rate: u32,
  pub hop_size: usize,
  pub smoothing_window: usize,
  pub min_run: usize,
}

impl SegmentConfig {
  pub fn new(config: &DecisionConfig, sample_rate: u32) -> Self {
    Self {
      sample_rate,
      hop_size: config.audio_hop,
      smoothing_window: config.smoothing_window,
      min_run: config.min_run,
    }
  }

  /// 帧序号换算为秒
  pub fn frame_time(&self, frame: usize) -> f64 {
    (frame * self.hop_size) as f64 / self.sample_rate as f64
  }
}

/// 逐帧与模板求相似度并取最大者的下标，结果长度等于帧数
pub fn frame_labels(bank: &TemplateBank, chroma: &Array2<f32>) -> Result<Vec<usize>, AudioError> {
  if chroma.nrows() != PITCH_CLASSES {
    return Err(AudioError::ChromaShape(chroma.nrows()));
  }
  let mut normalized = chroma.clone();
  normalize_columns(&mut normalized);

  // [T, 12] x [12, K] = [T, K]
  let sims = normalized.t().dot(&bank.matrix().t());
  let labels = sims
    .axis_iter(Axis(0))
    .map(|row| {
      let mut best = 0usize;
      for (k, &s) in row.iter().enumerate() {
        if s > row[best] {
          best = k;
        }
      }
      best
    })
    .collect();
  Ok(labels)
}

/// 以每帧为中心、宽度为奇数的窗口取众数；两端不足半窗的帧保持不变
pub fn majority_filter<T: Clone + Eq + Hash>(seq: &[T], window: usize) -> Vec<T> {
  let window = if window % 2 == 0 { window + 1 } else { window };
  let half = window / 2;
  let mut out = seq.to_vec();
  if seq.len() <= 2 * half {
    return out;
  }
  for i in half..seq.len() - half {
    if let Some(mode) = mode_first_seen(&seq[i - half..=i + half]) {
      out[i] = mode.value.clone();
    }
  }
  out
}

/// 短于 `min_len` 的连续段并入其后一段；位于末尾时并入前一段
pub fn enforce_min_run<T: Clone + Eq>(seq: &[T], min_len: usize) -> Vec<T> {
  let mut out = seq.to_vec();
  let mut start = 0;
  while start < out.len() {
    let mut end = start;
    while end < out.len() && out[end] == out[start] {
      end += 1;
    }
    if end - start < min_len {
      let fill = if end < out.len() {
        out[end].clone()
      } else if start > 0 {
        out[start - 1].clone()
      } else {
        out[start].clone()
      };
      for slot in &mut out[start..end] {
        *slot = fill.clone();
      }
    }
    start = end;
  }
  out
}

/// 相邻同标签的帧合并为一段
pub fn segments_by_runs(labels: &[&'static str], config: &SegmentConfig) -> Vec<Segment> {
  let mut segments = Vec::new();
  let Some(&first) = labels.first() else {
    return segments;
  };

  let mut start = 0;
  let mut current = first;
  for (i, &label) in labels.iter().enumerate().skip(1) {
    if label != current {
      segments.push(Segment {
        start: config.frame_time(start),
        end: config.frame_time(i),
        label: current,
      });
      current = label;
      start = i;
    }
  }
  segments.push(Segment {
    start: config.frame_time(start),
    end: config.frame_time(labels.len()),
    label: current,
  });
  segments
}

/// 每个节拍区间 [t0, t1) 内的帧投票，相邻同标签的节拍合并
pub fn segments_by_beats(
  labels: &[&'static str],
  config: &SegmentConfig,
  beats: &[f64],
) -> Vec<Segment> {
  let frame_times: Vec<f64> = (0..labels.len()).map(|i| config.frame_time(i)).collect();
  let mut segments: Vec<Segment> = Vec::new();

  for pair in beats.windows(2) {
    let (t0, t1) = (pair[0], pair[1]);
    let lo = frame_times.partition_point(|&t| t < t0);
    let hi = frame_times.partition_point(|&t| t < t1);
    if lo >= hi {
      continue;
    }
    let Some(mode) = mode_first_seen(&labels[lo..hi]) else {
      continue;
    };
    let label = *mode.value;

    match segments.last_mut() {
      Some(last) if last.label == label => last.end = t1,
      _ => segments.push(Segment {
        start: t0,
        end: t1,
        label,
      }),
    }
  }
  segments
}

/// 对整段色度矩阵做分段；节拍少于两个时按连续段输出
pub fn segment_chroma(
  bank: &TemplateBank,
  chroma: &Array2<f32>,
  config: &SegmentConfig,
  beats: Option<&[f64]>,
) -> Result<Vec<Segment>, AudioError> {
  let labels: Vec<&'static str> = frame_labels(bank, chroma)?
    .into_iter()
    .filter_map(|idx| bank.label(idx))
    .collect();
  let labels = majority_filter(&labels, config.smoothing_window);
  let labels = enforce_min_run(&labels, config.min_run);
  debug!("平滑后帧数: {}", labels.len());

  let segments = match beats {
    Some(beats) if beats.len() >= 2 => segments_by_beats(&labels, config, beats),
    _ => segments_by_runs(&labels, config),
  };
  info!("分段完成: {} 帧, {} 段", labels.len(), segments.len());
  Ok(segments)
}

/// 从原始采样开始：提取色度后分段
pub fn segment_recording<E: ChromaExtractor>(
  extractor: &E,
  samples: &[f32],
  config: &SegmentConfig,
  beats: Option<&[f64]>,
) -> Result<Vec<Segment>, AudioError> {
  let chroma = extractor.extract(samples, config.sample_rate)?;
  segment_chroma(TemplateBank::standard(), &chroma, config, beats)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(sample_rate: u32, hop_size: usize) -> SegmentConfig {
    SegmentConfig {
      sample_rate,
      hop_size,
      smoothing_window: 7,
      min_run: 5,
    }
  }

  fn repeat(parts: &[(&'static str, usize)]) -> Vec<&'static str> {
    parts
      .iter()
      .flat_map(|&(label, n)| std::iter::repeat_n(label, n))
      .collect()
  }

  fn triad_column(notes: [usize; 3]) -> [f32; 12] {
    let mut column = [0.0; 12];
    for n in notes {
      column[n] = 1.0;
    }
    column
  }

  fn chroma_from(columns: &[[f32; 12]]) -> Array2<f32> {
    Array2::from_shape_fn((12, columns.len()), |(p, t)| columns[t][p])
  }

  #[test]
  fn majority_filter_removes_isolated_frame() {
    let seq = repeat(&[("A", 3), ("B", 1), ("A", 3)]);
    let out = majority_filter(&seq, 7);
    assert_eq!(out, repeat(&[("A", 7)]));
  }

  #[test]
  fn majority_filter_keeps_short_sequences() {
    let seq = repeat(&[("A", 2), ("B", 2)]);
    assert_eq!(majority_filter(&seq, 7), seq);
  }

  #[test]
  fn even_window_is_widened() {
    // 宽度 2 视为 3
    let seq = repeat(&[("A", 1), ("B", 1), ("A", 1)]);
    assert_eq!(majority_filter(&seq, 2), repeat(&[("A", 3)]));
  }

  #[test]
  fn short_run_is_absorbed_by_following_run() {
    let seq = repeat(&[("A", 6), ("B", 2), ("C", 6)]);
    let out = enforce_min_run(&seq, 5);
    assert_eq!(out.len(), seq.len());
    assert_eq!(out, repeat(&[("A", 6), ("C", 8)]));
  }

  #[test]
  fn trailing_short_run_takes_preceding_label() {
    let seq = repeat(&[("A", 6), ("B", 2)]);
    assert_eq!(enforce_min_run(&seq, 5), repeat(&[("A", 8)]));
  }

  #[test]
  fn lone_short_run_is_left_alone() {
    let seq = repeat(&[("A", 3)]);
    assert_eq!(enforce_min_run(&seq, 5), seq);
    assert!(enforce_min_run::<&str>(&[], 5).is_empty());
  }

  #[test]
  fn runs_become_contiguous_segments() {
    let labels = repeat(&[("A", 2), ("B", 3)]);
    let segments = segments_by_runs(&labels, &config(4, 1));
    assert_eq!(
      segments,
      vec![
        Segment {
          start: 0.0,
          end: 0.5,
          label: "A"
        },
        Segment {
          start: 0.5,
          end: 1.25,
          label: "B"
        },
      ]
    );
    assert!(segments_by_runs(&[], &config(4, 1)).is_empty());
  }

  #[test]
  fn beats_vote_and_merge() {
    // 帧时间为 0, 0.25, 0.5, ...
    let labels = repeat(&[("A", 4), ("B", 4)]);
    let segments = segments_by_beats(&labels, &config(4, 1), &[0.0, 0.5, 1.0, 2.0]);
    assert_eq!(
      segments,
      vec![
        Segment {
          start: 0.0,
          end: 1.0,
          label: "A"
        },
        Segment {
          start: 1.0,
          end: 2.0,
          label: "B"
        },
      ]
    );
  }

  #[test]
  fn beats_without_frames_are_skipped() {
    let labels = repeat(&[("A", 4)]);
    let segments = segments_by_beats(&labels, &config(4, 1), &[5.0, 6.0]);
    assert!(segments.is_empty());
  }

  #[test]
  fn frame_labels_pick_best_template() {
    let chroma = chroma_from(&[triad_column([7, 11, 2]), triad_column([0, 4, 7])]);
    let labels = frame_labels(TemplateBank::standard(), &chroma).unwrap();
    let names: Vec<_> = labels
      .into_iter()
      .map(|i| TemplateBank::standard().label(i).unwrap())
      .collect();
    assert_eq!(names, vec!["G", "C"]);
  }

  #[test]
  fn glitch_in_recording_is_smoothed_away() {
    let c = triad_column([0, 4, 7]);
    let g = triad_column([7, 11, 2]);
    let mut columns = vec![c; 20];
    columns.extend([g, g]);
    columns.extend(vec![c; 20]);

    let cfg = config(44100, 1024);
    let segments = segment_chroma(TemplateBank::standard(), &chroma_from(&columns), &cfg, None)
      .unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].label, "C");
    assert_eq!(segments[0].start, 0.0);
    assert_eq!(segments[0].end, cfg.frame_time(42));
  }

  #[test]
  fn single_beat_falls_back_to_runs() {
    let c = triad_column([0, 4, 7]);
    let cfg = config(44100, 1024);
    let segments =
      segment_chroma(TemplateBank::standard(), &chroma_from(&vec![c; 10]), &cfg, Some(&[0.5]))
        .unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].end, cfg.frame_time(10));
  }
}
