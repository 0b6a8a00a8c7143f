// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/pipeline.rs - 单帧与单段音频的完整处理流程
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

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::audio::{AudioClassifier, AudioError, ChromaExtractor};
use crate::frame::RoiFrame;
use crate::input::{InputError, decode_pcm16le};
use crate::label::{LabelResolver, LabelVocabulary, normalize_key};
use crate::model::{ClassProbabilities, DetectResult, Model};
use crate::response::{
  AudioChunkResult, FramePrediction, HealthReport, RoiRejection, RoiReport, TopKEntry,
};
use crate::roi::RoiSelector;
use crate::session::{DEFAULT_SESSION, SessionRegistry};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("检测模型推理失败: {0}")]
  Detector(#[source] BoxedError),
  #[error("分类模型推理失败: {0}")]
  Classifier(#[source] BoxedError),
  #[error("分类结果有 {actual} 类，标签词表有 {expected} 类")]
  ClassCount { expected: usize, actual: usize },
  #[error("音频分析失败: {0}")]
  Audio(#[from] AudioError),
}

/// 一帧图像请求
#[derive(Debug, Clone)]
pub struct FrameRequest<F> {
  pub frame: F,
  /// 目标和弦，空白视为未给出
  pub target: Option<String>,
  pub session: String,
  pub observed_at: Instant,
}

impl<F> FrameRequest<F> {
  pub fn new(frame: F) -> Self {
    Self {
      frame,
      target: None,
      session: DEFAULT_SESSION.to_string(),
      observed_at: Instant::now(),
    }
  }

  pub fn with_target(mut self, target: Option<String>) -> Self {
    self.target = target
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty());
    self
  }

  pub fn with_session(mut self, session: impl Into<String>) -> Self {
    self.session = session.into();
    self
  }

  pub fn with_observed_at(mut self, observed_at: Instant) -> Self {
    self.observed_at = observed_at;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrameOutcome {
  Prediction(FramePrediction),
  RoiTooSmall(RoiRejection),
}

impl FrameOutcome {
  pub fn prediction(&self) -> Option<&FramePrediction> {
    match self {
      FrameOutcome::Prediction(p) => Some(p),
      FrameOutcome::RoiTooSmall(_) => None,
    }
  }
}

/// 检测 → ROI → 分类 → 标签正名 → 会话投票与判分
pub struct FramePipeline<D, C> {
  detector: D,
  classifier: C,
  /// 按类别下标排列的正名
  canonical: Box<[String]>,
  /// 正名的规范化键，用于与目标比较
  keys: Box<[String]>,
  selector: RoiSelector,
  top_k: usize,
  sessions: Arc<SessionRegistry>,
}

impl<F, D, C> FramePipeline<D, C>
where
  F: RoiFrame,
  D: Model<Input = F, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  C: Model<Input = F, Output = ClassProbabilities>,
  C::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(
    detector: D,
    classifier: C,
    vocabulary: &LabelVocabulary,
    sessions: Arc<SessionRegistry>,
  ) -> Self {
    let resolver = LabelResolver::standard();
    let canonical: Box<[String]> = vocabulary
      .iter()
      .map(|raw| resolver.resolve(raw).to_string())
      .collect();
    let keys = canonical.iter().map(|l| normalize_key(l)).collect();
    let config = sessions.config();

    Self {
      detector,
      classifier,
      canonical,
      keys,
      selector: RoiSelector::from(config),
      top_k: config.top_k,
      sessions,
    }
  }

  pub fn sessions(&self) -> &Arc<SessionRegistry> {
    &self.sessions
  }

  pub fn num_classes(&self) -> usize {
    self.canonical.len()
  }

  pub fn health(&self) -> HealthReport {
    HealthReport::ok(self.num_classes())
  }

  /// 处理一帧
  ///
  /// ROI 过小时返回 [`FrameOutcome::RoiTooSmall`]，会话状态不变；
  /// 推理失败时同样不触碰会话状态。
  pub fn predict(&self, request: &FrameRequest<F>) -> Result<FrameOutcome, PipelineError> {
    let started = Instant::now();

    let detections = self
      .detector
      .infer(&request.frame)
      .map_err(|e| PipelineError::Detector(Box::new(e)))?;
    let roi = self.selector.select(&detections);
    if !roi.is_usable() {
      debug!("ROI 过小: {:?}", roi.rect);
      return Ok(FrameOutcome::RoiTooSmall(RoiRejection::new(
        &roi,
        elapsed_ms(started),
      )));
    }

    let crop = request.frame.crop(&roi.rect);
    let probs = self
      .classifier
      .infer(&crop)
      .map_err(|e| PipelineError::Classifier(Box::new(e)))?;
    if probs.len() != self.num_classes() {
      return Err(PipelineError::ClassCount {
        expected: self.num_classes(),
        actual: probs.len(),
      });
    }

    let (class_index, confidence) = probs.argmax();
    let target_key = request.target.as_deref().map(normalize_key);
    let is_target = |idx: usize| {
      target_key
        .as_deref()
        .is_some_and(|key| self.keys.get(idx).is_some_and(|k| k == key))
    };

    let session = self.sessions.session(&request.session);
    let verdict = session.observe_frame(
      class_index,
      confidence,
      target_key.as_ref().map(|_| &is_target as &dyn Fn(usize) -> bool),
      request.observed_at,
    );
    if verdict.score_event {
      info!("会话 {} 判分: {}", session.id(), self.canonical[class_index]);
    }

    let top_k = probs
      .top_k(self.top_k)
      .into_iter()
      .map(|(idx, prob)| TopKEntry {
        label: self.canonical[idx].clone(),
        prob,
      })
      .collect();

    let majority = verdict.majority;
    let has_target = target_key.is_some();
    Ok(FrameOutcome::Prediction(FramePrediction {
      label: self.canonical[class_index].clone(),
      confidence,
      majority_label: majority.map(|m| self.canonical[m.class_index].clone()),
      majority_confidence: majority.map(|m| m.confidence),
      is_correct: has_target.then(|| is_target(class_index)),
      is_correct_majority: majority
        .filter(|_| has_target)
        .map(|m| is_target(m.class_index)),
      score_event: verdict.score_event,
      top_k,
      roi: RoiReport::from(&roi.rect),
      roi_state: roi.state,
      inference_ms: elapsed_ms(started),
    }))
  }
}

impl<F, D, C> Model for FramePipeline<D, C>
where
  F: RoiFrame,
  D: Model<Input = F, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  C: Model<Input = F, Output = ClassProbabilities>,
  C::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = FrameRequest<F>;
  type Output = FrameOutcome;
  type Error = PipelineError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input)
  }
}

fn elapsed_ms(started: Instant) -> u64 {
  started.elapsed().as_millis() as u64
}

/// 一段音频请求，负载为单声道 16 位小端 PCM
#[derive(Debug, Clone)]
pub struct AudioChunkRequest {
  pub pcm: Vec<u8>,
  /// 缺省时使用配置中的采样率
  pub sample_rate: Option<u32>,
  pub session: String,
}

impl AudioChunkRequest {
  pub fn new(pcm: Vec<u8>) -> Self {
    Self {
      pcm,
      sample_rate: None,
      session: DEFAULT_SESSION.to_string(),
    }
  }

  pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
    self.sample_rate = Some(sample_rate);
    self
  }

  pub fn with_session(mut self, session: impl Into<String>) -> Self {
    self.session = session.into();
    self
  }
}

/// 解码 → 能量门限与模板匹配 → 会话内投票
pub struct AudioPipeline<E> {
  classifier: AudioClassifier<E>,
  default_sample_rate: u32,
  sessions: Arc<SessionRegistry>,
}

impl<E: ChromaExtractor> AudioPipeline<E> {
  pub fn new(extractor: E, sessions: Arc<SessionRegistry>) -> Self {
    let config = sessions.config();
    Self {
      classifier: AudioClassifier::new(extractor, config),
      default_sample_rate: config.audio_sample_rate,
      sessions,
    }
  }

  pub fn sessions(&self) -> &Arc<SessionRegistry> {
    &self.sessions
  }

  pub fn process(&self, request: &AudioChunkRequest) -> Result<AudioChunkResult, PipelineError> {
    let samples = decode_pcm16le(&request.pcm)?;
    let sample_rate = request.sample_rate.unwrap_or(self.default_sample_rate);
    let classification = self.classifier.classify(&samples, sample_rate)?;
    let vote = self
      .sessions
      .session(&request.session)
      .observe_chunk(&classification);
    debug!(
      "音频段: {} ({:.3}), 能量 {:.4}, 投票 {}",
      classification.label, classification.confidence, classification.energy, vote
    );

    Ok(AudioChunkResult {
      chord: classification.label,
      conf: classification.confidence,
      energy: classification.energy,
      vote,
    })
  }
}

impl<E: ChromaExtractor> Model for AudioPipeline<E> {
  type Input = AudioChunkRequest;
  type Output = AudioChunkResult;
  type Error = PipelineError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.process(input)
  }
}
