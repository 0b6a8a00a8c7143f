// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/audio/hpss.rs - 中值滤波谐波/打击分离
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

const MASK_EPS: f32 = 1e-10;

fn median(window: &mut [f32]) -> f32 {
  window.sort_unstable_by(|a, b| a.total_cmp(b));
  window[window.len() / 2]
}

/// 沿某一轴做截断窗口的中值滤波
fn median_filter(mag: &Array2<f32>, axis: Axis, kernel: usize) -> Array2<f32> {
  let half = kernel / 2;
  let mut out = Array2::zeros(mag.raw_dim());
  let mut buf = Vec::with_capacity(kernel);
  for (lane_in, mut lane_out) in mag.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
    let n = lane_in.len();
    for i in 0..n {
      let lo = i.saturating_sub(half);
      let hi = (i + half + 1).min(n);
      buf.clear();
      buf.extend(lane_in.iter().skip(lo).take(hi - lo).copied());
      lane_out[i] = median(&mut buf);
    }
  }
  out
}

/// 幅度谱 [频率, 时间] 的谐波分量
///
/// 时间方向中值滤波保留持续音，频率方向中值滤波保留瞬态；
/// 以二者能量比作软掩码，压制拨弦瞬态。
pub fn harmonic_spectrum(mag: &Array2<f32>, kernel: usize) -> Array2<f32> {
  let kernel = kernel.max(1);
  // 时间轴为第 1 维，沿该轴的 lane 即每个频点随时间的序列
  let harmonic = median_filter(mag, Axis(1), kernel);
  let percussive = median_filter(mag, Axis(0), kernel);

  let mut out = mag.clone();
  ndarray::Zip::from(&mut out)
    .and(&harmonic)
    .and(&percussive)
    .for_each(|o, &h, &p| {
      let h2 = h * h;
      let p2 = p * p;
      *o *= h2 / (h2 + p2 + MASK_EPS);
    });
  out
}
