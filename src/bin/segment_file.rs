// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/bin/segment_file.rs - 整段录音的离线和弦分段
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

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use url::Url;

use qinxian::{
  FromUrl,
  audio::{SegmentConfig, StftChroma, segment_recording},
  config::DecisionConfig,
  input::{PcmInput, decode_pcm16le},
  output::{OutputWrapper, Render},
};
use tracing::info;

/// 对整段 PCM 录音做和弦分段
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 判定阈值配置（JSON）
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
  /// 输入来源，如 pcm:///path/to/song.raw?sr=22050
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 节拍时间文件（秒），JSON 数组或空白分隔
  #[arg(long, value_name = "BEATS")]
  pub beats: Option<PathBuf>,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:?pretty")]
  pub output: Url,
}

fn read_beats(path: &Path) -> Result<Vec<f64>> {
  let text = std::fs::read_to_string(path)?;
  if let Ok(beats) = serde_json::from_str::<Vec<f64>>(&text) {
    return Ok(beats);
  }
  text
    .split_whitespace()
    .map(|t| {
      t.parse::<f64>()
        .map_err(|e| anyhow::anyhow!("无法解析节拍时间 {:?}: {}", t, e))
    })
    .collect()
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = match &args.config {
    Some(path) => DecisionConfig::from_path(path)?,
    None => DecisionConfig::default(),
  };
  let beats = match &args.beats {
    Some(path) => Some(read_beats(path)?),
    None => None,
  };

  let input = PcmInput::from_url(&args.input)?;
  let segment_config = SegmentConfig::new(&config, input.sample_rate());
  let pcm: Vec<u8> = input.flat_map(|request| request.pcm).collect();
  let samples = decode_pcm16le(&pcm)?;
  info!(
    "录音时长 {:.2} 秒",
    samples.len() as f64 / segment_config.sample_rate as f64
  );

  let extractor = StftChroma::default().with_hop_size(config.audio_hop);
  let segments = segment_recording(&extractor, &samples, &segment_config, beats.as_deref())?;

  let output = OutputWrapper::from_url(&args.output)?;
  output.render_result(&segments)?;

  Ok(())
}
