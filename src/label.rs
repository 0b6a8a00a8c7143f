// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/label.rs - 和弦正名与标签词表
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
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, info};

/// 支持的 12 个和弦正名（展示用拼写）
pub const CANONICAL_LABELS: [&str; 12] = [
  "Am", "Am7", "B", "Bm", "C", "Cadd9", "D", "D7/F#", "Dsus4", "Em", "Em7", "G",
];

/// 标签规范化 key，仅用于相等比较，不用于展示
///
/// 去掉首尾空白，`♯` 换成 `#`，删除内部空白，`_` 换成 `/`，最后转大写。
pub fn normalize_key(label: &str) -> String {
  label
    .trim()
    .chars()
    .filter(|c| !c.is_whitespace())
    .map(|c| match c {
      '♯' => '#',
      '_' => '/',
      c => c,
    })
    .collect::<String>()
    .to_uppercase()
}

/// 把任意拼写映射到和弦正名
#[derive(Debug, Clone)]
pub struct LabelResolver {
  by_key: HashMap<String, &'static str>,
}

impl Default for LabelResolver {
  fn default() -> Self {
    Self::new()
  }
}

impl LabelResolver {
  pub fn new() -> Self {
    let by_key = CANONICAL_LABELS
      .iter()
      .map(|&label| (normalize_key(label), label))
      .collect();
    Self { by_key }
  }

  /// 进程内共享的解析表，只构建一次
  pub fn standard() -> &'static LabelResolver {
    static RESOLVER: OnceLock<LabelResolver> = OnceLock::new();
    RESOLVER.get_or_init(LabelResolver::new)
  }

  /// 查不到正名时原样返回
  pub fn resolve<'a>(&self, raw: &'a str) -> &'a str {
    match self.by_key.get(&normalize_key(raw)) {
      Some(&canonical) => canonical,
      None => {
        debug!("标签 {:?} 没有对应的正名，原样透传", raw);
        raw
      }
    }
  }

  pub fn is_canonical(&self, label: &str) -> bool {
    self.by_key.contains_key(&normalize_key(label))
  }
}

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("标签词表为空")]
  Empty,
}

/// 分类模型的标签词表，顺序与训练顺序一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
  labels: Box<[String]>,
}

impl LabelVocabulary {
  /// 逐行解析，容忍行尾逗号与空白，跳过空行
  pub fn parse(text: &str) -> Result<Self, LabelError> {
    let labels: Vec<String> = text
      .lines()
      .map(|line| line.trim_matches(|c: char| c == ',' || c.is_whitespace()))
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();

    if labels.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self {
      labels: labels.into_boxed_slice(),
    })
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let vocabulary = Self::parse(&text)?;
    info!("加载标签词表 {}，共 {} 类", path.display(), vocabulary.len());
    Ok(vocabulary)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

impl FromIterator<String> for LabelVocabulary {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self {
      labels: iter.into_iter().collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_key_collapses_spelling_variants() {
    assert_eq!(normalize_key("  d7_f♯ "), "D7/F#");
    assert_eq!(normalize_key("C add9"), "CADD9");
    assert_eq!(normalize_key(""), "");
  }

  #[test]
  fn normalize_key_is_idempotent() {
    for raw in ["D7_F#", " em 7 ", "a\tm", "Dsus4,", "ß", "x \t y_z♯", ""] {
      let once = normalize_key(raw);
      assert_eq!(normalize_key(&once), once, "input {:?}", raw);
    }
  }

  #[test]
  fn every_canonical_label_resolves_from_an_alias() {
    let resolver = LabelResolver::new();
    for label in CANONICAL_LABELS {
      assert_eq!(resolver.resolve(label), label);
      let alias = format!(" {} ", label.to_lowercase().replace('/', "_").replace('#', "♯"));
      assert_eq!(resolver.resolve(&alias), label, "alias {:?}", alias);
    }
  }

  #[test]
  fn unknown_label_passes_through() {
    assert_eq!(LabelResolver::standard().resolve("F#m7b5"), "F#m7b5");
  }

  #[test]
  fn vocabulary_tolerates_trailing_commas() {
    let vocabulary = LabelVocabulary::parse("Am,\n Am7 , \n\nD7_F#,\r\n").unwrap();
    assert_eq!(vocabulary.len(), 3);
    assert_eq!(vocabulary.get(0), Some("Am"));
    assert_eq!(vocabulary.get(1), Some("Am7"));
    assert_eq!(vocabulary.get(2), Some("D7_F#"));
    assert_eq!(vocabulary.get(3), None);
  }

  #[test]
  fn empty_vocabulary_is_rejected() {
    assert!(matches!(LabelVocabulary::parse(" ,\n\n"), Err(LabelError::Empty)));
  }
}
