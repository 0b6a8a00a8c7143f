// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/config.rs - 判定阈值配置
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

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("无法读取配置文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("配置文件格式错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("配置项 {field} 无效: {reason}")]
  Invalid { field: &'static str, reason: String },
}

/// 视觉与音频判定的全部阈值
///
/// JSON 文件中缺省的字段取默认值。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
  pub roi_overlap_min: f64,
  pub roi_expand_ratio: f64,
  pub roi_min_side: i32,

  pub vision_vote_window: usize,
  pub vision_confidence_min: f32,
  pub hold_frames: u32,
  pub cooldown_secs: f64,
  pub top_k: usize,

  pub audio_confidence_min: f32,
  pub energy_gate: f32,
  pub audio_vote_window: usize,
  pub audio_hop: usize,
  pub audio_sample_rate: u32,

  pub smoothing_window: usize,
  pub min_run: usize,
}

impl Default for DecisionConfig {
  fn default() -> Self {
    Self {
      roi_overlap_min: 0.20,
      roi_expand_ratio: 1.20,
      roi_min_side: 20,

      vision_vote_window: 5,
      vision_confidence_min: 0.30,
      hold_frames: 3,
      cooldown_secs: 1.0,
      top_k: 5,

      audio_confidence_min: 0.30,
      energy_gate: 0.02,
      audio_vote_window: 5,
      audio_hop: 1024,
      audio_sample_rate: 44100,

      smoothing_window: 7,
      min_run: 5,
    }
  }
}

impl DecisionConfig {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let config: Self = serde_json::from_str(&text)?;
    config.validate()?;
    info!("加载判定配置: {}", path.display());
    Ok(config)
  }

  /// 判分冷却时长；未经校验的超界取值饱和到 `Duration::ZERO` 或 `Duration::MAX`
  pub fn cooldown(&self) -> Duration {
    if self.cooldown_secs > 0.0 {
      Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::MAX)
    } else {
      Duration::ZERO
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    fn invalid(field: &'static str, reason: &str) -> ConfigError {
      ConfigError::Invalid {
        field,
        reason: reason.to_string(),
      }
    }

    if !(0.0..=1.0).contains(&self.roi_overlap_min) {
      return Err(invalid("roi_overlap_min", "必须在 [0, 1] 之间"));
    }
    if !(self.roi_expand_ratio.is_finite() && self.roi_expand_ratio > 0.0) {
      return Err(invalid("roi_expand_ratio", "必须为正数"));
    }
    if self.roi_min_side < 0 {
      return Err(invalid("roi_min_side", "不能为负"));
    }
    if self.vision_vote_window == 0 {
      return Err(invalid("vision_vote_window", "不能为 0"));
    }
    if self.audio_vote_window == 0 {
      return Err(invalid("audio_vote_window", "不能为 0"));
    }
    if !(0.0..=1.0).contains(&self.vision_confidence_min) {
      return Err(invalid("vision_confidence_min", "必须在 [0, 1] 之间"));
    }
    if !(0.0..=1.0).contains(&self.audio_confidence_min) {
      return Err(invalid("audio_confidence_min", "必须在 [0, 1] 之间"));
    }
    if !(self.energy_gate.is_finite() && self.energy_gate >= 0.0) {
      return Err(invalid("energy_gate", "不能为负"));
    }
    if !(self.cooldown_secs.is_finite() && self.cooldown_secs >= 0.0) {
      return Err(invalid("cooldown_secs", "不能为负"));
    }
    if let Err(e) = Duration::try_from_secs_f64(self.cooldown_secs) {
      return Err(invalid("cooldown_secs", &e.to_string()));
    }
    if self.hold_frames == 0 {
      return Err(invalid("hold_frames", "不能为 0"));
    }
    if self.audio_hop == 0 || self.audio_sample_rate == 0 {
      return Err(invalid("audio_hop", "帧移与采样率不能为 0"));
    }
    if self.smoothing_window == 0 {
      return Err(invalid("smoothing_window", "不能为 0"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(DecisionConfig::default().validate().is_ok());
    assert_eq!(DecisionConfig::default().cooldown(), Duration::from_secs(1));
  }

  #[test]
  fn partial_json_keeps_defaults() {
    let config: DecisionConfig = serde_json::from_str(r#"{ "hold_frames": 4 }"#).unwrap();
    assert_eq!(config.hold_frames, 4);
    assert_eq!(config.vision_vote_window, 5);
    assert_eq!(config.energy_gate, 0.02);
  }

  #[test]
  fn zero_window_is_rejected() {
    let config = DecisionConfig {
      vision_vote_window: 0,
      ..Default::default()
    };
    assert!(matches!(
      config.validate(),
      Err(ConfigError::Invalid {
        field: "vision_vote_window",
        ..
      })
    ));
  }

  #[test]
  fn oversized_cooldown_is_rejected() {
    let config: DecisionConfig = serde_json::from_str(r#"{ "cooldown_secs": 1e30 }"#).unwrap();
    assert!(matches!(
      config.validate(),
      Err(ConfigError::Invalid {
        field: "cooldown_secs",
        ..
      })
    ));
    assert_eq!(config.cooldown(), Duration::MAX);

    let negative = DecisionConfig {
      cooldown_secs: -1.0,
      ..Default::default()
    };
    assert_eq!(negative.cooldown(), Duration::ZERO);
  }

  #[test]
  fn oversized_cooldown_file_fails_to_load() {
    let path = std::env::temp_dir().join(format!("qinxian-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "cooldown_secs": 1e30 }"#).unwrap();
    let result = DecisionConfig::from_path(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
  }
}
