// 该文件是 Qinxian （琴弦） 项目的一部分。
// src/task.rs - 请求循环驱动
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

use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};
use tracing::{error, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一个请求
pub struct OneShotTask;

impl<
  Q,
  R,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Q>,
  M: Model<Input = Q, Output = R, Error = ME>,
  O: Render<R, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let request = input.next().ok_or_else(|| anyhow::anyhow!("没有输入请求"))?;
    let now = std::time::Instant::now();
    let result = model.infer(&request)?;
    info!("处理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&result)?;

    Ok(())
  }
}

/// 依次处理全部请求，直到输入结束、达到请求数上限或收到 Ctrl-C
#[derive(Default, Debug)]
pub struct ContinuousTask {
  request_limit: Option<usize>,
  keep_going: bool,
}

impl ContinuousTask {
  pub fn with_request_limit(mut self, request_limit: Option<usize>) -> Self {
    self.request_limit = request_limit;
    self
  }

  /// 单个请求失败时记录后继续，而不是中止任务
  pub fn with_keep_going(mut self, keep_going: bool) -> Self {
    self.keep_going = keep_going;
    self
  }

  fn interrupt_channel() -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    let installed = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = installed {
      warn!("无法注册 Ctrl-C 处理: {}", e);
    }
    rx
  }
}

impl<
  Q,
  R,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Q>,
  M: Model<Input = Q, Output = R, Error = ME>,
  O: Render<R, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let rx = Self::interrupt_channel();

    let mut index = 0usize;
    let mut failed = 0usize;
    for request in input {
      index += 1;
      let now = std::time::Instant::now();
      match model.infer(&request) {
        Ok(result) => output.render_result(&result)?,
        Err(e) if self.keep_going => {
          failed += 1;
          error!("第 {} 个请求处理失败: {}", index, e);
        }
        Err(e) => return Err(e.into()),
      }
      info!("第 {} 个请求处理完成，耗时: {:.2?}", index, now.elapsed());

      if self.request_limit.is_some_and(|n| index >= n) {
        info!("达到指定请求数 {}, 退出任务循环", index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 个请求，失败 {} 个", index, failed);
    Ok(())
  }
}
