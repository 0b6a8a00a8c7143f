// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/bin/audio_chunks.rs - 逐段音频和弦判定
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

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use url::Url;

use qinxian::{
  FromUrl,
  audio::StftChroma,
  config::DecisionConfig,
  input::PcmInput,
  output::OutputWrapper,
  pipeline::AudioPipeline,
  session::SessionRegistry,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// 把 PCM 音频流切段，逐段输出和弦、能量与窗口投票
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 判定阈值配置（JSON）
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
  /// 输入来源，如 pcm:///path/to/take.raw?sr=44100&chunk=1.0 或 pcm:-
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,

  #[arg(long, value_name = "REQUEST_LIMIT")]
  pub request_limit: Option<usize>,
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
  let extractor = StftChroma::default().with_hop_size(config.audio_hop);
  let pipeline = AudioPipeline::new(extractor, Arc::new(SessionRegistry::new(config)));

  let input = PcmInput::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  // 过短的尾段只记录错误
  ContinuousTask::default()
    .with_request_limit(args.request_limit)
    .with_keep_going(true)
    .run_task(input, pipeline, output)?;

  Ok(())
}
