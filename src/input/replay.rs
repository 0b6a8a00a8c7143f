// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/input/replay.rs - 回放已记录的检测与分类结果
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

//! 每行一个 JSON 记录：
//!
//! ```json
//! {"width":640,"height":480,
//!  "detections":[{"class_name":"hand","bbox":{"x1":0,"y1":0,"x2":100,"y2":100}}],
//!  "probs":[0.1,0.9],"target":"C","session":"s1","t_ms":33}
//! ```
//!
//! `probs` 为分类器在该帧 ROI 上的输出；`t_ms` 为相对回放开始的毫秒数。

use std::convert::Infallible;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use super::{InputError, query_param, url_path};
use crate::frame::RoiFrame;
use crate::geometry::Rect;
use crate::model::{ClassProbabilities, DetectItem, DetectResult, Model, ProbabilityError};
use crate::pipeline::FrameRequest;
use crate::{FromUrl, FromUrlWithScheme};

/// 一帧的记录数据，充当可裁剪的帧
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayFrame {
  pub width: u32,
  pub height: u32,
  #[serde(default)]
  pub detections: Vec<DetectItem>,
  #[serde(default)]
  pub probs: Vec<f32>,
}

impl RoiFrame for ReplayFrame {
  fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  fn crop(&self, roi: &Rect) -> Self {
    Self {
      width: roi.width() as u32,
      height: roi.height() as u32,
      detections: Vec::new(),
      probs: self.probs.clone(),
    }
  }
}

/// 返回记录中的检测结果
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordedDetector;

impl Model for RecordedDetector {
  type Input = ReplayFrame;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, input: &ReplayFrame) -> Result<DetectResult, Infallible> {
    Ok(DetectResult {
      width: input.width,
      height: input.height,
      items: input.detections.clone().into_boxed_slice(),
    })
  }
}

/// 返回记录中的类别概率
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordedClassifier;

impl Model for RecordedClassifier {
  type Input = ReplayFrame;
  type Output = ClassProbabilities;
  type Error = ProbabilityError;

  fn infer(&self, input: &ReplayFrame) -> Result<ClassProbabilities, ProbabilityError> {
    ClassProbabilities::try_from(input.probs.clone())
  }
}

#[derive(Deserialize)]
struct ReplayRecord {
  #[serde(flatten)]
  frame: ReplayFrame,
  #[serde(default)]
  target: Option<String>,
  #[serde(default)]
  session: Option<String>,
  #[serde(default)]
  t_ms: Option<u64>,
}

/// `replay:///path/to/frames.jsonl?target=C&session=s1`，路径为 `-` 时读标准输入
///
/// 查询参数给出记录缺省时的目标与会话。无法解析的行被跳过。
pub struct ReplayInput {
  reader: Box<dyn BufRead + Send>,
  line: usize,
  started: Instant,
  target: Option<String>,
  session: Option<String>,
}

impl FromUrlWithScheme for ReplayInput {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayInput {
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

    let path = url_path(url);
    let reader: Box<dyn BufRead + Send> = if path == "-" {
      info!("从标准输入读取回放记录");
      Box::new(BufReader::new(std::io::stdin()))
    } else {
      info!("读取回放记录: {}", path);
      Box::new(BufReader::new(File::open(&*path)?))
    };

    Ok(Self::from_reader(reader)
      .with_defaults(query_param(url, "target"), query_param(url, "session")))
  }
}

impl ReplayInput {
  pub fn from_reader(reader: Box<dyn BufRead + Send>) -> Self {
    Self {
      reader,
      line: 0,
      started: Instant::now(),
      target: None,
      session: None,
    }
  }

  pub fn with_defaults(mut self, target: Option<String>, session: Option<String>) -> Self {
    self.target = target;
    self.session = session;
    self
  }

  fn parse(&self, text: &str) -> Result<FrameRequest<ReplayFrame>, InputError> {
    let record: ReplayRecord =
      serde_json::from_str(text).map_err(|source| InputError::Replay {
        line: self.line,
        source,
      })?;

    let observed_at = match record.t_ms {
      Some(ms) => self.started + Duration::from_millis(ms),
      None => Instant::now(),
    };
    let mut request = FrameRequest::new(record.frame)
      .with_target(record.target.or_else(|| self.target.clone()))
      .with_observed_at(observed_at);
    if let Some(session) = record.session.or_else(|| self.session.clone()) {
      request = request.with_session(session);
    }
    Ok(request)
  }
}

impl Iterator for ReplayInput {
  type Item = FrameRequest<ReplayFrame>;

  fn next(&mut self) -> Option<Self::Item> {
    let mut buf = String::new();
    loop {
      buf.clear();
      match self.reader.read_line(&mut buf) {
        Ok(0) => return None,
        Ok(_) => self.line += 1,
        Err(e) => {
          error!("读取回放记录失败: {}", e);
          return None;
        }
      }
      let text = buf.trim();
      if text.is_empty() {
        continue;
      }
      match self.parse(text) {
        Ok(request) => return Some(request),
        Err(e) => warn!("跳过无效记录: {}", e),
      }
    }
  }
}
