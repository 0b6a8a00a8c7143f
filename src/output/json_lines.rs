// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/output/json_lines.rs - 追加写入 JSON Lines 文件
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

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{FromUrl, FromUrlWithScheme, input::url_path, output::Render};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `jsonl:///path/to/results.jsonl`，文件存在时追加
pub struct JsonLinesOutput {
  path: PathBuf,
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch);
    }
    Self::open(&*url_path(uri))
  }
}

impl JsonLinesOutput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("结果写入 {}", path.display());
    Ok(Self {
      path,
      writer: Mutex::new(BufWriter::new(file)),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<R: Serialize> Render<R> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, result: &R) -> Result<(), Self::Error> {
    let line = serde_json::to_string(result)?;
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn appends_one_line_per_result() {
    let dir = std::env::temp_dir().join(format!("qinxian-jsonl-{}", std::process::id()));
    let path = dir.join("out.jsonl");
    let _ = std::fs::remove_file(&path);

    let output = JsonLinesOutput::open(&path).unwrap();
    output.render_result(&json!({"vote": "C"})).unwrap();
    output.render_result(&json!({"vote": "G"})).unwrap();
    drop(output);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "{\"vote\":\"C\"}\n{\"vote\":\"G\"}\n");
    let _ = std::fs::remove_dir_all(&dir);
  }
}
