// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/frame.rs - 帧裁剪与分类器输入张量
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

use crate::geometry::Rect;

/// 可以按 ROI 裁剪的帧
pub trait RoiFrame: Sized {
  /// (宽, 高)
  fn dimensions(&self) -> (u32, u32);

  /// 裁剪 [x1, x2) × [y1, y2)，调用方保证 ROI 已裁剪到帧内
  fn crop(&self, roi: &Rect) -> Self;
}

#[cfg(feature = "read_image_file")]
pub use self::rgb::{CLASSIFIER_INPUT_SIZE, ClassifierTensor};

#[cfg(feature = "read_image_file")]
mod rgb {
  use image::{RgbImage, imageops};

  use super::RoiFrame;
  use crate::geometry::Rect;

  const RGB_CHANNELS: usize = 3;
  const RESIZE_SHORT_SIDE: u32 = 256;
  pub const CLASSIFIER_INPUT_SIZE: u32 = 224;
  const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
  const STD: [f32; 3] = [0.229, 0.224, 0.225];

  impl RoiFrame for RgbImage {
    fn dimensions(&self) -> (u32, u32) {
      RgbImage::dimensions(self)
    }

    fn crop(&self, roi: &Rect) -> Self {
      let x = roi.x1.max(0) as u32;
      let y = roi.y1.max(0) as u32;
      imageops::crop_imm(self, x, y, roi.width() as u32, roi.height() as u32).to_image()
    }
  }

  /// 分类器输入，NCHW 排列的 f32 张量（N = 1）
  #[derive(Debug, Clone)]
  pub struct ClassifierTensor {
    data: Box<[f32]>,
    height: usize,
    width: usize,
  }

  impl ClassifierTensor {
    pub fn height(&self) -> usize {
      self.height
    }

    pub fn width(&self) -> usize {
      self.width
    }

    pub fn channels(&self) -> usize {
      RGB_CHANNELS
    }

    pub fn as_nchw(&self) -> &[f32] {
      &self.data
    }
  }

  /// 短边缩放到 256，中心裁剪 224，再按 ImageNet 均值方差归一化
  impl From<&RgbImage> for ClassifierTensor {
    fn from(image: &RgbImage) -> Self {
      let resized = resize_short_side(image, RESIZE_SHORT_SIDE);
      let cropped = center_crop(&resized, CLASSIFIER_INPUT_SIZE);

      let (width, height) = (cropped.width() as usize, cropped.height() as usize);
      let mut data = vec![0f32; RGB_CHANNELS * height * width];
      for c in 0..RGB_CHANNELS {
        for h in 0..height {
          for w in 0..width {
            let value = cropped.get_pixel(w as u32, h as u32)[c] as f32 / 255.0;
            let index = c * height * width + h * width + w;
            data[index] = (value - MEAN[c]) / STD[c];
          }
        }
      }

      Self {
        data: data.into_boxed_slice(),
        height,
        width,
      }
    }
  }

  fn resize_short_side(image: &RgbImage, short: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
      return image.clone();
    }
    let scale = short as f64 / w.min(h) as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle)
  }

  fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let x = w.saturating_sub(size) / 2;
    let y = h.saturating_sub(size) / 2;
    imageops::crop_imm(image, x, y, size.min(w), size.min(h)).to_image()
  }

  #[cfg(test)]
  mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn crop_takes_half_open_range() {
      let mut image = RgbImage::new(40, 30);
      image.put_pixel(10, 5, Rgb([255, 0, 0]));
      let crop = RoiFrame::crop(&image, &Rect::new(10, 5, 30, 25));
      assert_eq!(RoiFrame::dimensions(&crop), (20, 20));
      assert_eq!(crop.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn tensor_has_classifier_shape() {
      let image = RgbImage::from_pixel(640, 480, Rgb([124, 116, 104]));
      let tensor = ClassifierTensor::from(&image);
      assert_eq!(tensor.width(), 224);
      assert_eq!(tensor.height(), 224);
      assert_eq!(tensor.as_nchw().len(), 3 * 224 * 224);
      // 接近均值的像素归一化后接近 0
      assert!(tensor.as_nchw().iter().all(|v| v.abs() < 0.05));
    }
  }
}
