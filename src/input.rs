// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/input.rs - 请求输入与原始数据解码
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

use std::borrow::Cow;

use thiserror::Error;
use tracing::warn;
use url::Url;

mod pcm;
mod replay;

pub use self::pcm::PcmInput;
pub use self::replay::{RecordedClassifier, RecordedDetector, ReplayFrame, ReplayInput};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, decode_frame};

/// 少于该字节数的 PCM 负载不做分析
pub const MIN_PCM_BYTES: usize = 1000;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("缺少图像数据")]
  MissingImage,
  #[cfg(feature = "read_image_file")]
  #[error("图像解码失败: {0}")]
  DecodeFailed(#[from] image::ImageError),
  #[error("音频数据为空或过短: {0} 字节")]
  AudioTooShort(usize),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("回放记录第 {line} 行解析失败: {source}")]
  Replay {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: &'static str, value: String },
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

impl InputError {
  /// 返回给调用方的错误码
  pub fn code(&self) -> &'static str {
    match self {
      InputError::MissingImage => "missing_image",
      #[cfg(feature = "read_image_file")]
      InputError::DecodeFailed(_) => "decode_failed",
      InputError::AudioTooShort(_) => "empty_or_too_short",
      InputError::Io(_) => "io_error",
      InputError::Replay { .. } => "invalid_record",
      InputError::InvalidParameter { .. } => "invalid_parameter",
      InputError::SchemeMismatch => "scheme_mismatch",
    }
  }
}

/// 单声道 16 位小端 PCM 转为 [-1, 1) 浮点采样
///
/// 奇数长度时末尾多出的一个字节被丢弃。
pub fn decode_pcm16le(bytes: &[u8]) -> Result<Vec<f32>, InputError> {
  if bytes.len() < MIN_PCM_BYTES {
    return Err(InputError::AudioTooShort(bytes.len()));
  }
  if bytes.len() % 2 != 0 {
    warn!("PCM 数据长度为奇数 ({} 字节)，忽略最后一个字节", bytes.len());
  }
  Ok(
    bytes
      .chunks_exact(2)
      .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
      .collect(),
  )
}

/// URL 中的文件路径，已做百分号解码
pub(crate) fn url_path(url: &Url) -> Cow<'_, str> {
  urlencoding::decode(url.path()).unwrap_or(Cow::Borrowed(url.path()))
}

/// 查询参数中的布尔开关，`1`/`true`/`yes`/`y` 视为真
pub(crate) fn truthy(value: &str) -> bool {
  matches!(
    value.trim().to_ascii_lowercase().as_str(),
    "1" | "true" | "yes" | "y"
  )
}

pub(crate) fn query_param(url: &Url, name: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == name)
    .map(|(_, v)| v.into_owned())
}

pub(crate) fn parse_param<T: std::str::FromStr>(
  url: &Url,
  name: &'static str,
) -> Result<Option<T>, InputError> {
  match query_param(url, name) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| InputError::InvalidParameter { name, value }),
    None => Ok(None),
  }
}
