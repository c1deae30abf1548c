// 该文件是 Wenfeng （文风） 项目的一部分。
// src/task.rs - 任务
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

use std::{thread, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
  analyzer::FrameAnalyzer,
  frame::{FrameMeta, YuvFrame},
  model::{ClassifyResult, InputTensor, Model, Scores},
  output::Render,
};

pub trait Task<I, A, O>: Sized {
  type Error;
  fn run_task(self, input: I, analyzer: A, output: O) -> Result<(), Self::Error>;
}

/// 取第一帧，分析一次后结束；任何失败都向上传播
pub struct OneShotTask;

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Model<Input = InputTensor, Output = Scores>,
  I: Iterator<Item = Result<YuvFrame, IE>>,
  O: Render<FrameMeta, ClassifyResult, Error = RE>,
> Task<I, FrameAnalyzer<M>, O> for OneShotTask
where
  M::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    mut analyzer: FrameAnalyzer<M>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    let meta = frame.meta();
    info!("输入帧获取成功，开始分析...");
    let now = std::time::Instant::now();
    let result = analyzer
      .analyze(frame)?
      .ok_or_else(|| anyhow::anyhow!("帧数据不完整，无法分析"))?;
    let elapsed = now.elapsed();
    info!("分析完成，耗时: {:.2?}", elapsed);
    output.render_result(&meta, &result)?;
    info!("渲染完成，耗时: {:.2?}", elapsed);

    Ok(())
  }
}

/// 持续消费输入流，逐帧分析并渲染
///
/// 推理失败只记录日志不中断任务；输入源错误与渲染错误向上传播。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  M: Model<Input = InputTensor, Output = Scores>,
  I: Iterator<Item = Result<YuvFrame, IE>>,
  O: Render<FrameMeta, ClassifyResult, Error = RE>,
> Task<I, FrameAnalyzer<M>, O> for ContinuousTask
where
  M::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    mut analyzer: FrameAnalyzer<M>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .expect("Error setting Ctrl-C handler");

    let mut frame_count: usize = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      let frame = frame?;
      frame_count = frame_count.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_count);
      let meta = frame.meta();
      match analyzer.analyze(frame) {
        Ok(Some(result)) => {
          let elapsed_a = now.elapsed();
          output.render_result(&meta, &result)?;
          let elapsed_b = now.elapsed();
          info!("分析完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        Ok(None) => {
          debug!("帧 {} 数据不可用，已跳过", meta.index);
        }
        Err(e) => {
          // 推理失败只影响当前帧
          error!("帧 {} 分析失败: {}", meta.index, e);
        }
      }
      now = std::time::Instant::now();
      if self.frame_number.map(|n| frame_count >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_count);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::convert::Infallible;
  use std::sync::{Arc, Mutex};
  use std::sync::atomic::{AtomicUsize, Ordering};

  use image::RgbImage;

  use super::*;
  use crate::convert::rgb_to_i420;
  use crate::frame::YuvFormat;
  use crate::model::FakeModel;
  use crate::output::Render;

  /// 记录每次渲染的 (帧索引, 结果数) 的测试输出
  #[derive(Clone)]
  struct CollectOutput {
    seen: Arc<Mutex<Vec<(u64, usize)>>>,
  }

  impl CollectOutput {
    fn new() -> Self {
      Self {
        seen: Arc::new(Mutex::new(Vec::new())),
      }
    }
  }

  impl Render<FrameMeta, ClassifyResult> for CollectOutput {
    type Error = Infallible;

    fn render_result(&self, frame: &FrameMeta, result: &ClassifyResult) -> Result<(), Self::Error> {
      self.seen.lock().unwrap().push((frame.index, result.len()));
      Ok(())
    }
  }

  fn make_frame(index: u64, released: &Arc<AtomicUsize>) -> YuvFrame {
    let rgb = RgbImage::from_pixel(4, 4, image::Rgb([100, 100, 100]));
    let c = released.clone();
    YuvFrame::new(YuvFormat::I420, 4, 4, rgb_to_i420(&rgb))
      .with_index(index)
      .with_release_hook(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
      }))
  }

  #[test]
  fn oneshot_analyzes_first_frame() {
    let released = Arc::new(AtomicUsize::new(0));
    let input = vec![Ok::<_, Infallible>(make_frame(0, &released))].into_iter();
    let analyzer = FrameAnalyzer::new(FakeModel::with_scores([0.9, 0.5, 0.1]));
    let output = CollectOutput::new();

    OneShotTask
      .run_task(input, analyzer, output.clone())
      .unwrap();

    assert_eq!(*output.seen.lock().unwrap(), vec![(0, 2)]);
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn oneshot_fails_without_frames() {
    let input = std::iter::empty::<Result<YuvFrame, Infallible>>();
    let analyzer = FrameAnalyzer::new(FakeModel::with_scores([0.9, 0.5, 0.1]));
    let result = OneShotTask.run_task(input, analyzer, CollectOutput::new());
    assert!(result.is_err());
  }

  #[test]
  fn oneshot_propagates_inference_failure() {
    let released = Arc::new(AtomicUsize::new(0));
    let input = vec![Ok::<_, Infallible>(make_frame(0, &released))].into_iter();
    let analyzer = FrameAnalyzer::new(FakeModel::failing());
    let result = OneShotTask.run_task(input, analyzer, CollectOutput::new());
    assert!(result.is_err());
    assert_eq!(released.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn continuous_contains_inference_failures_and_stops_at_frame_number() {
    let released = Arc::new(AtomicUsize::new(0));
    let released_src = released.clone();
    let mut next_index = 0u64;
    let input = std::iter::repeat_with(move || {
      let frame = make_frame(next_index, &released_src);
      next_index += 1;
      Ok::<_, Infallible>(frame)
    });

    let model = FakeModel::failing();
    let probe = model.clone();
    let analyzer = FrameAnalyzer::new(model);
    let output = CollectOutput::new();

    ContinuousTask::default()
      .with_frame_number(Some(3))
      .run_task(input, analyzer, output.clone())
      .unwrap();

    // 三帧都推理失败, 任务仍正常结束, 帧全部释放, 没有渲染发生
    assert_eq!(probe.calls(), 3);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    assert!(output.seen.lock().unwrap().is_empty());
  }
}
