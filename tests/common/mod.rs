// 该文件是 Qinxian （琴弦） 项目的一部分。
// tests/common/mod.rs - 集成测试共用的合成数据
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

#![allow(dead_code)]

use std::f32::consts::PI;

pub const SAMPLE_RATE: u32 = 22050;

pub const C_MAJOR: [f32; 3] = [261.63, 329.63, 392.00];
pub const G_MAJOR: [f32; 3] = [196.00, 246.94, 293.66];

/// 若干正弦叠加，峰值不超过 `amplitude`
pub fn chord(freqs: &[f32], secs: f32, amplitude: f32) -> Vec<f32> {
  let n = (SAMPLE_RATE as f32 * secs) as usize;
  (0..n)
    .map(|i| {
      let t = i as f32 / SAMPLE_RATE as f32;
      let sum: f32 = freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum();
      amplitude * sum / freqs.len() as f32
    })
    .collect()
}

pub fn to_pcm16le(samples: &[f32]) -> Vec<u8> {
  samples
    .iter()
    .flat_map(|s| ((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes())
    .collect()
}
