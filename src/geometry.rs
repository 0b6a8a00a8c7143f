// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/geometry.rs - 像素矩形几何工具
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

/// 整数像素矩形，坐标为 [x1, y1, x2, y2]
///
/// 反转或退化的矩形是合法值，其面积按 0 计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl Rect {
  pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 整帧矩形，右下角取最后一个像素的坐标
  pub fn full_frame(width: u32, height: u32) -> Self {
    Self::new(0, 0, last_pixel(width), last_pixel(height))
  }

  pub fn width(&self) -> i32 {
    (self.x2 - self.x1).max(0)
  }

  pub fn height(&self) -> i32 {
    (self.y2 - self.y1).max(0)
  }

  /// 较短边长度
  pub fn min_side(&self) -> i32 {
    self.width().min(self.height())
  }

  /// 面积，退化矩形为 0，永不为负
  pub fn area(&self) -> i64 {
    self.width() as i64 * self.height() as i64
  }

  /// 求交集，宽或高非正时返回 None
  pub fn intersect(&self, other: &Rect) -> Option<Rect> {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);
    if x2 <= x1 || y2 <= y1 {
      return None;
    }
    Some(Rect::new(x1, y1, x2, y2))
  }

  /// 本矩形覆盖 `base` 的比例（IOA），分母至少为 1
  ///
  /// 不对称：`inter.overlap_ratio(&hand)` 衡量手部框被覆盖的程度。
  pub fn overlap_ratio(&self, base: &Rect) -> f64 {
    self.area() as f64 / base.area().max(1) as f64
  }

  /// 以中心为基准按 `ratio` 缩放，再裁剪到帧范围内
  pub fn expand(&self, ratio: f64, frame_width: u32, frame_height: u32) -> Rect {
    let cx = (self.x1 + self.x2) as f64 / 2.0;
    let cy = (self.y1 + self.y2) as f64 / 2.0;
    let w = (self.x2 - self.x1) as f64 * ratio;
    let h = (self.y2 - self.y1) as f64 * ratio;

    // `as` 向零截断
    let x1 = ((cx - w / 2.0) as i32).max(0);
    let y1 = ((cy - h / 2.0) as i32).max(0);
    let x2 = ((cx + w / 2.0) as i32).min(last_pixel(frame_width));
    let y2 = ((cy + h / 2.0) as i32).min(last_pixel(frame_height));
    Rect::new(x1, y1, x2, y2)
  }
}

fn last_pixel(extent: u32) -> i32 {
  i32::try_from(extent).unwrap_or(i32::MAX).saturating_sub(1).max(0)
}

impl From<[i32; 4]> for Rect {
  fn from(v: [i32; 4]) -> Self {
    Rect::new(v[0], v[1], v[2], v[3])
  }
}
