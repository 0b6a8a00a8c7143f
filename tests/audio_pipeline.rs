// 该文件是 Qinxian （琴弦） 项目的一部分。
// tests/audio_pipeline.rs - 音频判定流程的端到端测试
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

mod common;

use std::sync::Arc;

use qinxian::{
  audio::{ChordLabel, StftChroma},
  pipeline::{AudioChunkRequest, AudioPipeline, PipelineError},
  session::SessionRegistry,
};

use common::{G_MAJOR, SAMPLE_RATE, chord, to_pcm16le};

fn pipeline() -> AudioPipeline<StftChroma> {
  AudioPipeline::new(StftChroma::default(), Arc::new(SessionRegistry::default()))
}

fn chunk(samples: &[f32]) -> AudioChunkRequest {
  AudioChunkRequest::new(to_pcm16le(samples)).with_sample_rate(SAMPLE_RATE)
}

#[test]
fn strummed_g_is_recognized_and_voted() {
  let pipeline = pipeline();
  let g = chord(&G_MAJOR, 1.0, 0.5);

  let result = pipeline.process(&chunk(&g)).unwrap();
  assert_eq!(result.chord, ChordLabel::Chord("G"));
  assert!(result.conf >= 0.3);
  assert!(result.energy >= 0.02);
  assert_eq!(result.vote, ChordLabel::Chord("G"));

  // 静音段本身是 NC，但窗口投票仍为 G
  let silence = pipeline.process(&chunk(&vec![0.0; SAMPLE_RATE as usize])).unwrap();
  assert_eq!(silence.chord, ChordLabel::NoChord);
  assert_eq!(silence.conf, 0.0);
  assert_eq!(silence.energy, 0.0);
  assert_eq!(silence.vote, ChordLabel::Chord("G"));
}

#[test]
fn short_payload_reports_code() {
  let err = pipeline()
    .process(&AudioChunkRequest::new(vec![0; 999]))
    .unwrap_err();
  match err {
    PipelineError::Input(e) => assert_eq!(e.code(), "empty_or_too_short"),
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn result_serializes_with_wire_names() {
  let pipeline = pipeline();
  let result = pipeline
    .process(&chunk(&vec![0.0; SAMPLE_RATE as usize]))
    .unwrap();
  let value = serde_json::to_value(&result).unwrap();
  assert_eq!(value["chord"], "NC");
  assert_eq!(value["vote"], "NC");
  assert!(value.get("conf").is_some());
  assert!(value.get("energy").is_some());
}
