// 该文件是 Wenfeng （文风） 项目的一部分。
// src/analyzer.rs - 帧分类分析器
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

//! 逐帧文档分类
//!
//! [`FrameAnalyzer`] 以值的方式消费一帧 YUV 数据，依次执行：
//! 转换为 RGBA、按首帧捕获的旋转提示旋转、拉伸缩放到模型输入尺寸、
//! 打包归一化张量、推理、按阈值过滤得分。返回值即分类结果；
//! 无论成功、跳过还是推理失败，帧都会在返回前被释放恰好一次。
//!
//! `analyze` 要求 `&mut self`，同一个分析器同一时刻只处理一帧。

use image::{
  RgbaImage,
  imageops::{self, FilterType},
};
use ndarray::Array4;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  convert::convert_into,
  frame::{Rotation, YuvFrame},
  model::{ClassifyResult, DocLabel, InputTensor, Model, Recognition, Scores},
};

/// 模型输入边长
pub const INPUT_SIZE: u32 = 224;
/// 得分阈值，严格大于该值的类别才会进入结果
pub const SCORE_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug)]
pub enum AnalyzeError<E> {
  #[error("推理失败: {0}")]
  Inference(E),
}

/// 跨帧复用的暂存状态，首帧时初始化
struct ScratchState {
  /// 首帧捕获的旋转提示，之后不再更新
  rotation: Rotation,
  rgba: RgbaImage,
}

pub struct FrameAnalyzer<M> {
  model: M,
  scratch: Option<ScratchState>,
}

impl<M> FrameAnalyzer<M>
where
  M: Model<Input = InputTensor, Output = Scores>,
{
  /// 模型在启动阶段构建完成后注入，分析器本身不加载模型
  pub fn new(model: M) -> Self {
    Self {
      model,
      scratch: None,
    }
  }

  /// 分析一帧并同步返回分类结果
  ///
  /// 帧数据不完整时返回 `Ok(None)`，表示跳过而非出错；
  /// 推理失败返回 [`AnalyzeError::Inference`]。两种情况下帧都已释放。
  pub fn analyze(
    &mut self,
    frame: YuvFrame,
  ) -> Result<Option<ClassifyResult>, AnalyzeError<M::Error>> {
    if !frame.has_pixels() {
      debug!("帧 {} 不含完整像素数据, 跳过此帧", frame.index());
      return Ok(None);
    }

    if let Some(scratch) = &self.scratch {
      if scratch.rotation != frame.rotation() {
        warn!(
          "帧 {} 的旋转提示为 {} 度, 与首帧的 {} 度不一致, 仍沿用首帧设置",
          frame.index(),
          frame.rotation().degrees(),
          scratch.rotation.degrees()
        );
      }
    }
    let scratch = self.scratch.get_or_insert_with(|| {
      debug!(
        "按首帧初始化暂存状态: {}x{}, 旋转 {} 度",
        frame.width(),
        frame.height(),
        frame.rotation().degrees()
      );
      ScratchState {
        rotation: frame.rotation(),
        rgba: RgbaImage::new(frame.width(), frame.height()),
      }
    });

    if let Err(e) = convert_into(&frame, &mut scratch.rgba) {
      debug!("帧 {} 数据不完整, 跳过此帧: {}", frame.index(), e);
      return Ok(None);
    }

    let resized = rotate_and_resize(&scratch.rgba, scratch.rotation);
    let tensor = pack_tensor(&resized);

    let scores = self.model.infer(&tensor).map_err(AnalyzeError::Inference)?;

    let mut best = (DocLabel::Report, 0.0f32);
    for (label, score) in DocLabel::ALL.iter().zip(scores.iter()) {
      if *score > best.1 {
        best = (*label, *score);
      }
    }
    debug!("帧 {} 最高得分类别: {} ({:.3})", frame.index(), best.0, best.1);

    let result = select_recognitions(&scores);
    debug!("帧 {} 有 {} 个类别超过阈值", frame.index(), result.len());
    Ok(Some(result))
  }
}

/// 按捕获的旋转提示旋转后拉伸到模型输入尺寸，不保持宽高比
fn rotate_and_resize(rgba: &RgbaImage, rotation: Rotation) -> RgbaImage {
  match rotation {
    Rotation::Deg0 => imageops::resize(rgba, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle),
    Rotation::Deg90 => imageops::resize(
      &imageops::rotate90(rgba),
      INPUT_SIZE,
      INPUT_SIZE,
      FilterType::Triangle,
    ),
    Rotation::Deg180 => imageops::resize(
      &imageops::rotate180(rgba),
      INPUT_SIZE,
      INPUT_SIZE,
      FilterType::Triangle,
    ),
    Rotation::Deg270 => imageops::resize(
      &imageops::rotate270(rgba),
      INPUT_SIZE,
      INPUT_SIZE,
      FilterType::Triangle,
    ),
  }
}

/// 按行主序打包 NHWC 张量，RGB 三通道各除以 255，忽略透明通道
fn pack_tensor(rgba: &RgbaImage) -> InputTensor {
  let (w, h) = (rgba.width() as usize, rgba.height() as usize);
  let mut tensor = Array4::zeros((1, h, w, 3));
  for (x, y, pixel) in rgba.enumerate_pixels() {
    for c in 0..3 {
      tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
    }
  }
  tensor
}

/// 按类别索引顺序保留严格超过阈值的得分
fn select_recognitions(scores: &Scores) -> ClassifyResult {
  let items: Vec<Recognition> = DocLabel::ALL
    .iter()
    .zip(scores.iter())
    .filter(|&(_, &score)| score > SCORE_THRESHOLD)
    .map(|(&label, &score)| Recognition { label, score })
    .collect();
  ClassifyResult {
    items: items.into_boxed_slice(),
  }
}
