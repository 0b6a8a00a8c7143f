// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/vote.rs - 定长滑动窗口多数决
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

//! 两种平票规则：
//! - [`majority_first_reaching`]：从前往后扫描，最先达到最大计数的值胜出，用于实时投票窗口；
//! - [`mode_first_seen`]：计数最多者中，窗口内最先出现的值胜出，用于离线平滑。

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// 多数决结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Majority<K> {
  pub value: K,
  pub count: usize,
}

/// 扫描过程中最先把计数推到最大值的元素胜出
pub fn majority_first_reaching<K, I>(items: I) -> Option<Majority<K>>
where
  K: Eq + Hash + Clone,
  I: IntoIterator<Item = K>,
{
  let mut counts: HashMap<K, usize> = HashMap::new();
  let mut best: Option<Majority<K>> = None;
  for item in items {
    let count = counts.entry(item.clone()).or_insert(0);
    *count += 1;
    if best.as_ref().is_none_or(|b| *count > b.count) {
      best = Some(Majority {
        value: item,
        count: *count,
      });
    }
  }
  best
}

/// 计数最多者中最先出现的元素胜出
pub fn mode_first_seen<K: Eq + Hash>(items: &[K]) -> Option<Majority<&K>> {
  let mut counts: HashMap<&K, usize> = HashMap::with_capacity(items.len());
  for item in items {
    *counts.entry(item).or_insert(0) += 1;
  }
  let mut best: Option<Majority<&K>> = None;
  for item in items {
    let count = counts[item];
    if best.as_ref().is_none_or(|b| count > b.count) {
      best = Some(Majority { value: item, count });
    }
  }
  best
}

/// 定长先进先出窗口，溢出时淘汰最旧的元素
#[derive(Debug, Clone)]
pub struct VoteWindow<T> {
  capacity: usize,
  entries: VecDeque<T>,
}

impl<T> VoteWindow<T> {
  /// 容量至少为 1
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      capacity,
      entries: VecDeque::with_capacity(capacity),
    }
  }

  pub fn push(&mut self, entry: T) {
    if self.entries.len() == self.capacity {
      self.entries.pop_front();
    }
    self.entries.push_back(entry);
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// 从旧到新
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.entries.iter()
  }

  /// 按 `key` 投票，窗口为空时返回 None
  pub fn majority_by<K, F>(&self, key: F) -> Option<Majority<K>>
  where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
  {
    majority_first_reaching(self.entries.iter().map(key))
  }
}

impl<T: Eq + Hash + Clone> VoteWindow<T> {
  pub fn majority(&self) -> Option<Majority<T>> {
    self.majority_by(T::clone)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn majority_of_five() {
    let mut window = VoteWindow::new(5);
    for v in ["A", "A", "B", "A", "B"] {
      window.push(v);
    }
    assert_eq!(
      window.majority(),
      Some(Majority {
        value: "A",
        count: 3
      })
    );
  }

  #[test]
  fn tie_goes_to_first_scanned() {
    let mut window = VoteWindow::new(2);
    window.push("A");
    window.push("B");
    assert_eq!(window.majority().map(|m| m.value), Some("A"));
  }

  #[test]
  fn tie_goes_to_first_value_reaching_max() {
    // B 和 A 都出现两次，但 A 先到达 2
    let m = majority_first_reaching(["B", "A", "A", "B"]).unwrap();
    assert_eq!(m.value, "A");
    assert_eq!(m.count, 2);
  }

  #[test]
  fn mode_prefers_first_seen_on_tie() {
    let items = ["B", "A", "A", "B"];
    assert_eq!(mode_first_seen(&items).map(|m| *m.value), Some("B"));
    let empty: [&str; 0] = [];
    assert_eq!(mode_first_seen(&empty), None);
  }

  #[test]
  fn oldest_entry_is_evicted() {
    let mut window = VoteWindow::new(3);
    for v in [1, 1, 2, 2, 2] {
      window.push(v);
    }
    assert_eq!(window.len(), 3);
    assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 2, 2]);
  }

  #[test]
  fn empty_window_has_no_majority() {
    let window: VoteWindow<u8> = VoteWindow::new(0);
    assert_eq!(window.capacity(), 1);
    assert!(window.majority().is_none());
  }
}
