// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入与图像解码
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

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, RgbImage};
use tracing::{debug, error};
use url::Url;

use super::{InputError, query_param, truthy, url_path};
use crate::pipeline::FrameRequest;
use crate::{FromUrl, FromUrlWithScheme};

/// 解码图像字节，按 EXIF 方向摆正；前置摄像头画面可再做水平镜像
pub fn decode_frame(bytes: &[u8], mirror: bool) -> Result<RgbImage, InputError> {
  if bytes.is_empty() {
    return Err(InputError::MissingImage);
  }

  let mut decoder = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .map_err(ImageError::IoError)?
    .into_decoder()?;
  let orientation = decoder.orientation()?;
  let mut image = DynamicImage::from_decoder(decoder)?;
  image.apply_orientation(orientation);
  if mirror {
    image = image.fliph();
  }
  debug!("图像解码完成: {}x{}", image.width(), image.height());
  Ok(image.to_rgb8())
}

/// 单张图像文件：`image:///path/to/frame.jpg?mirror=1&target=C&session=s1`
pub struct ImageFileInput {
  request: Option<FrameRequest<RgbImage>>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}'，实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch);
    }

    let bytes = std::fs::read(&*url_path(url))?;
    let mirror = query_param(url, "mirror").is_some_and(|v| truthy(&v));
    let image = decode_frame(&bytes, mirror)?;

    let mut request = FrameRequest::new(image).with_target(query_param(url, "target"));
    if let Some(session) = query_param(url, "session") {
      request = request.with_session(session);
    }
    Ok(ImageFileInput {
      request: Some(request),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = FrameRequest<RgbImage>;

  fn next(&mut self) -> Option<Self::Item> {
    self.request.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb};

  fn png_bytes() -> Vec<u8> {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 0]));
    image.put_pixel(1, 0, Rgb([0, 0, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
  }

  #[test]
  fn decodes_and_mirrors() {
    let bytes = png_bytes();
    let plain = decode_frame(&bytes, false).unwrap();
    assert_eq!(plain.get_pixel(0, 0), &Rgb([255, 0, 0]));

    let mirrored = decode_frame(&bytes, true).unwrap();
    assert_eq!(mirrored.get_pixel(0, 0), &Rgb([0, 0, 255]));
  }

  #[test]
  fn garbage_is_decode_failed() {
    let err = decode_frame(b"definitely not an image", false).unwrap_err();
    assert_eq!(err.code(), "decode_failed");
    assert_eq!(decode_frame(&[], false).unwrap_err().code(), "missing_image");
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("replay:///tmp/frames.jsonl").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
