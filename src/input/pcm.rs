// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/input/pcm.rs - 原始 PCM 音频流按时长切段
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

use std::fs::File;
use std::io::{BufReader, Read};

use tracing::{error, info};
use url::Url;

use super::{InputError, parse_param, query_param, url_path};
use crate::pipeline::AudioChunkRequest;
use crate::{FromUrl, FromUrlWithScheme};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHUNK_SECS: f32 = 1.0;
const BYTES_PER_SAMPLE: usize = 2;

/// `pcm:///path/to/take.raw?sr=44100&chunk=1.0&session=s1`，路径为 `-` 时读标准输入
///
/// 每段 `chunk` 秒；最后不足一段的数据也会作为一段送出。
pub struct PcmInput {
  reader: Box<dyn Read + Send>,
  sample_rate: u32,
  chunk_bytes: usize,
  session: Option<String>,
  finished: bool,
}

impl FromUrlWithScheme for PcmInput {
  const SCHEME: &'static str = "pcm";
}

impl FromUrl for PcmInput {
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

    let sample_rate = parse_param(url, "sr")?.unwrap_or(DEFAULT_SAMPLE_RATE);
    let chunk_secs: f32 = parse_param(url, "chunk")?.unwrap_or(DEFAULT_CHUNK_SECS);
    if sample_rate == 0 {
      return Err(InputError::InvalidParameter {
        name: "sr",
        value: sample_rate.to_string(),
      });
    }
    if !chunk_secs.is_finite() || chunk_secs <= 0.0 {
      return Err(InputError::InvalidParameter {
        name: "chunk",
        value: chunk_secs.to_string(),
      });
    }

    let path = url_path(url);
    let reader: Box<dyn Read + Send> = if path == "-" {
      info!("从标准输入读取 PCM 音频");
      Box::new(std::io::stdin())
    } else {
      info!("读取 PCM 音频文件: {}", path);
      Box::new(BufReader::new(File::open(&*path)?))
    };

    let mut input = Self::from_reader(reader, sample_rate, chunk_secs);
    input.session = query_param(url, "session");
    Ok(input)
  }
}

impl PcmInput {
  pub fn from_reader(reader: Box<dyn Read + Send>, sample_rate: u32, chunk_secs: f32) -> Self {
    let samples = ((sample_rate as f32 * chunk_secs).round() as usize).max(1);
    Self {
      reader,
      sample_rate,
      chunk_bytes: samples * BYTES_PER_SAMPLE,
      session: None,
      finished: false,
    }
  }

  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  /// 读满一段或读到结尾
  fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(self.chunk_bytes);
    (&mut self.reader)
      .take(self.chunk_bytes as u64)
      .read_to_end(&mut buf)?;
    Ok(buf)
  }
}

impl Iterator for PcmInput {
  type Item = AudioChunkRequest;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }
    let pcm = match self.read_chunk() {
      Ok(pcm) => pcm,
      Err(e) => {
        error!("读取 PCM 数据失败: {}", e);
        self.finished = true;
        return None;
      }
    };
    if pcm.len() < self.chunk_bytes {
      self.finished = true;
    }
    if pcm.is_empty() {
      return None;
    }

    let mut request = AudioChunkRequest::new(pcm).with_sample_rate(self.sample_rate);
    if let Some(session) = &self.session {
      request = request.with_session(session.clone());
    }
    Some(request)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn stream_is_split_into_chunks() {
    let bytes = vec![0u8; 2 * 8000 + 600];
    let input = PcmInput::from_reader(Box::new(Cursor::new(bytes)), 8000, 0.5);
    let sizes: Vec<usize> = input.map(|r| r.pcm.len()).collect();
    assert_eq!(sizes, vec![8000, 8000, 600]);
  }

  #[test]
  fn chunks_carry_sample_rate() {
    let input = PcmInput::from_reader(Box::new(Cursor::new(vec![0u8; 4000])), 16000, 1.0);
    assert_eq!(input.sample_rate(), 16000);
    let requests: Vec<_> = input.collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].sample_rate, Some(16000));
    assert_eq!(requests[0].session, crate::session::DEFAULT_SESSION);
  }

  #[test]
  fn invalid_parameters_are_rejected() {
    let url = Url::parse("pcm:///dev/null?sr=0").unwrap();
    assert!(matches!(
      PcmInput::from_url(&url),
      Err(InputError::InvalidParameter { name: "sr", .. })
    ));
    let url = Url::parse("pcm:///dev/null?chunk=-1").unwrap();
    assert!(matches!(
      PcmInput::from_url(&url),
      Err(InputError::InvalidParameter { name: "chunk", .. })
    ));
  }
}
