// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/chroma.rs - 短时傅里叶变换色度提取
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

use std::f32::consts::PI;

use ndarray::{Array2, Axis};
use rustfft::{FftPlanner, num_complex::Complex};
use tracing::debug;

use super::AudioError;
use super::hpss::harmonic_spectrum;
use super::templates::PITCH_CLASSES;

const COLUMN_EPS: f32 = 1e-9;

/// 把一段音频变成 [12, T] 的逐帧音级能量矩阵
pub trait ChromaExtractor {
  fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Array2<f32>, AudioError>;
}

impl<E: ChromaExtractor + ?Sized> ChromaExtractor for &E {
  fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Array2<f32>, AudioError> {
    (**self).extract(samples, sample_rate)
  }
}

/// 每一列（帧）做 L2 归一化
pub fn normalize_columns(chroma: &mut Array2<f32>) {
  for mut column in chroma.axis_iter_mut(Axis(1)) {
    let norm = column.iter().map(|x| x * x).sum::<f32>().sqrt();
    column.mapv_inplace(|x| x / (norm + COLUMN_EPS));
  }
}

/// 内置提取器：居中分帧的 Hann 窗 STFT，谐波分离后按音级折叠
#[derive(Debug, Clone)]
pub struct StftChroma {
  frame_size: usize,
  hop_size: usize,
  hpss_kernel: usize,
  min_freq: f32,
  max_freq: f32,
  tuning_a4: f32,
}

impl Default for StftChroma {
  fn default() -> Self {
    Self {
      frame_size: 4096,
      hop_size: 1024,
      hpss_kernel: 17,
      min_freq: 55.0,
      max_freq: 5000.0,
      tuning_a4: 440.0,
    }
  }
}

impl StftChroma {
  pub fn with_hop_size(mut self, hop_size: usize) -> Self {
    self.hop_size = hop_size.max(1);
    self
  }

  pub fn with_frame_size(mut self, frame_size: usize) -> Self {
    self.frame_size = frame_size.max(2);
    self
  }

  pub fn with_hpss_kernel(mut self, kernel: usize) -> Self {
    self.hpss_kernel = kernel.max(1);
    self
  }

  pub fn hop_size(&self) -> usize {
    self.hop_size
  }

  /// 幅度谱，形状 [frame_size / 2 + 1, 1 + len / hop]
  fn magnitude_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
    let n = self.frame_size;
    let pad = n / 2;
    let bins = n / 2 + 1;
    let frames = 1 + samples.len() / self.hop_size;

    let window: Vec<f32> = (0..n)
      .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
      .collect();
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n);

    let mut mag = Array2::<f32>::zeros((bins, frames));
    let mut buffer = vec![Complex::new(0.0, 0.0); n];
    for t in 0..frames {
      let start = (t * self.hop_size) as isize - pad as isize;
      for (i, slot) in buffer.iter_mut().enumerate() {
        let idx = start + i as isize;
        let sample = if idx >= 0 {
          samples.get(idx as usize).copied().unwrap_or(0.0)
        } else {
          0.0
        };
        *slot = Complex::new(sample * window[i], 0.0);
      }
      fft.process(&mut buffer);
      for k in 0..bins {
        mag[[k, t]] = buffer[k].norm();
      }
    }
    mag
  }

  fn pitch_class(&self, freq: f32) -> usize {
    let semitones_from_a4 = (12.0 * (freq / self.tuning_a4).log2()).round() as i32;
    (semitones_from_a4 + 9).rem_euclid(PITCH_CLASSES as i32) as usize
  }
}

impl ChromaExtractor for StftChroma {
  fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Array2<f32>, AudioError> {
    if sample_rate == 0 {
      return Err(AudioError::InvalidSampleRate(sample_rate));
    }
    if samples.is_empty() {
      return Ok(Array2::zeros((PITCH_CLASSES, 0)));
    }

    let mag = self.magnitude_spectrogram(samples);
    let harmonic = harmonic_spectrum(&mag, self.hpss_kernel);

    let (bins, frames) = harmonic.dim();
    let bin_hz = sample_rate as f32 / self.frame_size as f32;
    let mut chroma = Array2::<f32>::zeros((PITCH_CLASSES, frames));
    for k in 1..bins {
      let freq = k as f32 * bin_hz;
      if freq < self.min_freq || freq > self.max_freq {
        continue;
      }
      let pc = self.pitch_class(freq);
      for t in 0..frames {
        chroma[[pc, t]] += harmonic[[k, t]];
      }
    }
    debug!("色度提取完成: {} 帧, 帧移 {}", frames, self.hop_size);
    Ok(chroma)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tone(freqs: &[f32], sample_rate: u32, secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * secs) as usize;
    (0..n)
      .map(|i| {
        let t = i as f32 / sample_rate as f32;
        freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
      })
      .collect()
  }

  #[test]
  fn frame_count_follows_hop() {
    let extractor = StftChroma::default().with_hop_size(1024);
    let chroma = extractor.extract(&vec![0.0; 44100], 44100).unwrap();
    assert_eq!(chroma.dim(), (12, 1 + 44100 / 1024));
  }

  #[test]
  fn a440_lands_on_pitch_class_a() {
    let extractor = StftChroma::default();
    let chroma = extractor.extract(&tone(&[440.0], 22050, 1.0), 22050).unwrap();
    let mean = chroma.mean_axis(Axis(1)).unwrap();
    let argmax = mean
      .iter()
      .enumerate()
      .max_by(|a, b| a.1.total_cmp(b.1))
      .map(|(i, _)| i);
    assert_eq!(argmax, Some(9));
  }

  #[test]
  fn pitch_class_mapping() {
    let extractor = StftChroma::default();
    assert_eq!(extractor.pitch_class(261.63), 0);
    assert_eq!(extractor.pitch_class(369.99), 6);
    assert_eq!(extractor.pitch_class(123.47), 11);
  }

  #[test]
  fn zero_sample_rate_is_rejected() {
    assert!(matches!(
      StftChroma::default().extract(&[0.1; 16], 0),
      Err(AudioError::InvalidSampleRate(0))
    ));
  }

  #[test]
  fn columns_become_unit_length() {
    let mut chroma = Array2::from_shape_fn((12, 3), |(p, t)| (p + t) as f32);
    normalize_columns(&mut chroma);
    for column in chroma.axis_iter(Axis(1)) {
      let norm: f32 = column.iter().map(|x| x * x).sum::<f32>().sqrt();
      assert!((norm - 1.0).abs() < 1e-5);
    }
  }
}
