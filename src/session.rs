// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/session.rs - 练习会话：视觉投票、保持计数与冷却判分
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

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::{AudioVoter, ChordLabel, ChunkClassification};
use crate::config::DecisionConfig;
use crate::vote::VoteWindow;

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq)]
struct VisionVote {
  class_index: usize,
  confidence: f32,
}

/// 视觉多数决结果，置信度为窗口内同类条目的均值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionMajority {
  pub class_index: usize,
  pub confidence: f32,
  pub count: usize,
}

#[derive(Debug, Clone)]
pub struct VisionVoter {
  window: VoteWindow<VisionVote>,
}

impl VisionVoter {
  pub fn new(capacity: usize) -> Self {
    Self {
      window: VoteWindow::new(capacity),
    }
  }

  pub fn push(&mut self, class_index: usize, confidence: f32) {
    self.window.push(VisionVote {
      class_index,
      confidence,
    });
  }

  pub fn majority(&self) -> Option<VisionMajority> {
    let majority = self.window.majority_by(|v| v.class_index)?;
    let sum: f32 = self
      .window
      .iter()
      .filter(|v| v.class_index == majority.value)
      .map(|v| v.confidence)
      .sum();
    Some(VisionMajority {
      class_index: majority.value,
      confidence: sum / majority.count as f32,
      count: majority.count,
    })
  }

  pub fn len(&self) -> usize {
    self.window.len()
  }

  pub fn is_empty(&self) -> bool {
    self.window.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
  Idle,
  Holding { class_index: usize, count: u32 },
}

/// 判分状态机的单帧输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldObservation {
  pub class_index: usize,
  pub confidence: f32,
  pub matches_target: bool,
}

/// 连续命中目标和弦若干帧后触发一次判分，两次判分之间至少间隔冷却时间
#[derive(Debug, Clone)]
pub struct ScoreMachine {
  hold: Hold,
  last_score: Option<Instant>,
  confidence_min: f32,
  hold_frames: u32,
  cooldown: Duration,
}

impl ScoreMachine {
  pub fn new(config: &DecisionConfig) -> Self {
    Self {
      hold: Hold::Idle,
      last_score: None,
      confidence_min: config.vision_confidence_min,
      hold_frames: config.hold_frames,
      cooldown: config.cooldown(),
    }
  }

  pub fn hold(&self) -> Hold {
    self.hold
  }

  pub fn last_score(&self) -> Option<Instant> {
    self.last_score
  }

  /// 推进一帧，返回本帧是否触发判分
  pub fn update(&mut self, observation: Option<HoldObservation>, now: Instant) -> bool {
    let Some(obs) = observation else {
      self.hold = Hold::Idle;
      return false;
    };

    self.hold = if obs.matches_target && obs.confidence >= self.confidence_min {
      match self.hold {
        Hold::Holding { class_index, count } if class_index == obs.class_index => Hold::Holding {
          class_index,
          count: count + 1,
        },
        _ => Hold::Holding {
          class_index: obs.class_index,
          count: 1,
        },
      }
    } else {
      Hold::Holding {
        class_index: obs.class_index,
        count: 0,
      }
    };

    match self.hold {
      Hold::Holding { class_index, count } if count >= self.hold_frames && self.cooled_down(now) => {
        debug!("类别 {} 连续保持 {} 帧，触发判分", class_index, count);
        self.last_score = Some(now);
        self.hold = Hold::Holding {
          class_index,
          count: 0,
        };
        true
      }
      _ => false,
    }
  }

  fn cooled_down(&self, now: Instant) -> bool {
    self
      .last_score
      .is_none_or(|last| now.saturating_duration_since(last) >= self.cooldown)
  }
}

#[derive(Debug)]
struct VisionState {
  voter: VisionVoter,
  scorer: ScoreMachine,
}

/// 单帧观测后的视觉判定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionVerdict {
  pub majority: Option<VisionMajority>,
  pub score_event: bool,
}

/// 一个练习会话的全部可变状态
///
/// 视觉状态与音频状态各自一把锁，读-改-写在锁内完成。
#[derive(Debug)]
pub struct PracticeSession {
  id: String,
  vision: Mutex<VisionState>,
  audio: Mutex<AudioVoter>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PracticeSession {
  pub fn new(id: impl Into<String>, config: &DecisionConfig) -> Self {
    Self {
      id: id.into(),
      vision: Mutex::new(VisionState {
        voter: VisionVoter::new(config.vision_vote_window),
        scorer: ScoreMachine::new(config),
      }),
      audio: Mutex::new(AudioVoter::new(config)),
    }
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// 记录一次有效分类并更新投票；给出 `is_target` 时同时推进判分状态机
  pub fn observe_frame(
    &self,
    class_index: usize,
    confidence: f32,
    is_target: Option<&dyn Fn(usize) -> bool>,
    now: Instant,
  ) -> VisionVerdict {
    let mut state = lock(&self.vision);
    state.voter.push(class_index, confidence);
    let majority = state.voter.majority();

    let score_event = match is_target {
      Some(is_target) => {
        let observation = majority.map(|m| HoldObservation {
          class_index: m.class_index,
          confidence: m.confidence,
          matches_target: is_target(m.class_index),
        });
        state.scorer.update(observation, now)
      }
      None => false,
    };

    VisionVerdict {
      majority,
      score_event,
    }
  }

  /// 记录一段音频的分类结果，返回窗口投票
  pub fn observe_chunk(&self, classification: &ChunkClassification) -> ChordLabel {
    lock(&self.audio).push(classification)
  }

  pub fn hold(&self) -> Hold {
    lock(&self.vision).scorer.hold()
  }

  pub fn vision_majority(&self) -> Option<VisionMajority> {
    lock(&self.vision).voter.majority()
  }
}

/// 按会话 id 管理练习会话
#[derive(Debug)]
pub struct SessionRegistry {
  config: DecisionConfig,
  sessions: Mutex<HashMap<String, Arc<PracticeSession>>>,
}

impl SessionRegistry {
  pub fn new(config: DecisionConfig) -> Self {
    Self {
      config,
      sessions: Mutex::new(HashMap::new()),
    }
  }

  pub fn config(&self) -> &DecisionConfig {
    &self.config
  }

  pub fn session(&self, id: &str) -> Arc<PracticeSession> {
    let mut sessions = lock(&self.sessions);
    sessions
      .entry(id.to_string())
      .or_insert_with(|| {
        info!("创建练习会话: {}", id);
        Arc::new(PracticeSession::new(id, &self.config))
      })
      .clone()
  }

  pub fn get(&self, id: &str) -> Option<Arc<PracticeSession>> {
    lock(&self.sessions).get(id).cloned()
  }

  pub fn remove(&self, id: &str) -> Option<Arc<PracticeSession>> {
    let removed = lock(&self.sessions).remove(id);
    if removed.is_some() {
      info!("结束练习会话: {}", id);
    }
    removed
  }

  pub fn len(&self) -> usize {
    lock(&self.sessions).len()
  }

  pub fn is_empty(&self) -> bool {
    lock(&self.sessions).is_empty()
  }
}

impl Default for SessionRegistry {
  fn default() -> Self {
    Self::new(DecisionConfig::default())
  }
}
