// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/bin/replay_frames.rs - 回放记录帧的视觉判定
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
  config::DecisionConfig,
  input::{RecordedClassifier, RecordedDetector, ReplayInput},
  label::LabelVocabulary,
  output::OutputWrapper,
  pipeline::FramePipeline,
  session::SessionRegistry,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// 回放记录的检测框与分类概率，逐帧输出判定结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类标签文件，每行一个标签
  #[arg(long, env = "LABELS_TXT", value_name = "LABELS")]
  pub labels: PathBuf,
  /// 判定阈值配置（JSON）
  #[arg(long, value_name = "CONFIG")]
  pub config: Option<PathBuf>,
  /// 输入来源，如 replay:///path/to/frames.jsonl
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 stdout: 或 jsonl:///path/to/out.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,

  #[arg(long, value_name = "REQUEST_LIMIT")]
  pub request_limit: Option<usize>,
  /// 单帧失败时继续处理后续帧
  #[arg(long)]
  pub keep_going: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("标签文件: {}", args.labels.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = match &args.config {
    Some(path) => DecisionConfig::from_path(path)?,
    None => DecisionConfig::default(),
  };
  let vocabulary = LabelVocabulary::from_path(&args.labels)?;
  let sessions = Arc::new(SessionRegistry::new(config));
  let pipeline = FramePipeline::new(RecordedDetector, RecordedClassifier, &vocabulary, sessions);
  info!("服务状态: {:?}", pipeline.health());

  let input = ReplayInput::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_request_limit(args.request_limit)
    .with_keep_going(args.keep_going)
    .run_task(input, pipeline, output)?;

  Ok(())
}
