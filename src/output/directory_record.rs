// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/output/directory_record.rs - 按日期目录逐条记录结果
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
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, input::url_path, output::Render};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `folder:///path/to/records?pretty`
///
/// 每条结果一个文件：`YYYY/MM/DD/HH-MM-SS-XXXX.json`，XXXX 为十六进制序号。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counters: Arc<Mutex<u16>>,
  pretty: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let pretty = uri.query_pairs().any(|(k, _)| k == "pretty");
    Ok(Self::new(PathBuf::from(&*url_path(uri))).with_pretty(pretty))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: PathBuf) -> Self {
    DirectoryRecordOutput {
      directory,
      frame_counters: Arc::new(Mutex::new(0)),
      pretty: false,
    }
  }

  pub fn with_pretty(mut self, pretty: bool) -> Self {
    self.pretty = pretty;
    self
  }

  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn record_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.json",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<R: Serialize> Render<R> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &R) -> Result<(), Self::Error> {
    let path = self.record_path(Utc::now())?;
    let text = if self.pretty {
      serde_json::to_vec_pretty(result)?
    } else {
      serde_json::to_vec(result)?
    };
    std::fs::write(path, text)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn records_land_in_dated_folders() {
    let root = std::env::temp_dir().join(format!("qinxian-folder-{}", std::process::id()));
    let output = DirectoryRecordOutput::new(root.clone());
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();

    let first = output.record_path(now).unwrap();
    let second = output.record_path(now).unwrap();
    assert_eq!(first, root.join("2026/03/07/09-05-01-0001.json"));
    assert_eq!(second, root.join("2026/03/07/09-05-01-0002.json"));
    assert!(root.join("2026/03/07").is_dir());
    let _ = std::fs::remove_dir_all(&root);
  }

  #[test]
  fn folder_scheme_only() {
    let url = url::Url::parse("jsonl:///tmp/x").unwrap();
    assert!(DirectoryRecordOutput::from_url(&url).is_err());
  }
}
