// 该文件是 Wenfeng （文风） 项目的一部分。
// src/model/docnet.rs - 模型定义
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

use ndarray::ArrayViewD;
use ort::{CUDAExecutionProvider, ExecutionProvider, GraphOptimizationLevel, Session};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DOC_CLASS_NUM, InputTensor, Model, Scores},
};

const DOCNET_NUM_INPUTS: usize = 1;
const DOCNET_NUM_OUTPUTS: usize = 1;
const DEFAULT_CPU_THREADS: usize = 4;

/// 基于 ONNX Runtime 的三分类文档模型
#[derive(Debug)]
pub struct DocNet {
  session: Session,
  input_name: String,
  output_name: String,
}

#[derive(Error, Debug)]
pub enum DocNetError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("无效的线程数: {0}")]
  InvalidThreads(String),
  #[error("预期模型输出 {expected} 个得分, 实际为 {actual} 个")]
  OutputShape { expected: usize, actual: usize },
}

impl From<std::io::Error> for DocNetError {
  fn from(err: std::io::Error) -> Self {
    DocNetError::ModelLoadError(err)
  }
}

impl From<ort::Error> for DocNetError {
  fn from(err: ort::Error) -> Self {
    DocNetError::OrtError(err)
  }
}

impl DocNetError {
  pub fn invalid(msg: &str) -> Self {
    DocNetError::ModelInvalid(msg.to_string())
  }
}

/// 推理加速方式，在启动时探测一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceleration {
  Gpu,
  Cpu { threads: usize },
}

impl Acceleration {
  /// 探测可用的加速方式：GPU 可用则用 GPU，否则回退到多线程 CPU
  pub fn probe() -> Self {
    match CUDAExecutionProvider::default().is_available() {
      Ok(true) => {
        info!("检测到可用 GPU, 启用 CUDA 加速");
        Acceleration::Gpu
      }
      Ok(false) => {
        info!("未检测到可用 GPU, 使用 {} 线程 CPU 推理", DEFAULT_CPU_THREADS);
        Acceleration::Cpu {
          threads: DEFAULT_CPU_THREADS,
        }
      }
      Err(e) => {
        warn!("查询 GPU 可用性失败: {}, 使用 CPU 推理", e);
        Acceleration::Cpu {
          threads: DEFAULT_CPU_THREADS,
        }
      }
    }
  }
}

pub struct DocNetBuilder {
  model_path: String,
  acceleration: Acceleration,
}

const DOCNET_SCHEME: &str = "docnet";

impl FromUrl for DocNetBuilder {
  type Error = DocNetError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != DOCNET_SCHEME {
      return Err(DocNetError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        DOCNET_SCHEME
      )));
    }

    let mut acceleration = None;
    for (key, value) in url.query_pairs() {
      if key == "threads" {
        let threads = value
          .parse::<usize>()
          .ok()
          .filter(|n| *n > 0)
          .ok_or_else(|| DocNetError::InvalidThreads(value.to_string()))?;
        acceleration = Some(Acceleration::Cpu { threads });
      }
    }

    Ok(DocNetBuilder {
      model_path: url.path().to_string(),
      acceleration: acceleration.unwrap_or_else(Acceleration::probe),
    })
  }
}

impl FromUrlWithScheme for DocNetBuilder {
  const SCHEME: &'static str = DOCNET_SCHEME;
}

impl DocNetBuilder {
  pub fn acceleration(mut self, acceleration: Acceleration) -> Self {
    self.acceleration = acceleration;
    self
  }

  pub fn build(self) -> Result<DocNet, DocNetError> {
    info!("加载模型文件: {}", self.model_path);
    let meta = std::fs::metadata(&self.model_path)?;
    debug!("模型文件大小: {:.2} MB", meta.len() as f64 / (1024.0 * 1024.0));

    info!("创建 ONNX Runtime 推理会话");
    let mut builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    builder = match self.acceleration {
      Acceleration::Gpu => {
        builder.with_execution_providers([CUDAExecutionProvider::default().build()])?
      }
      Acceleration::Cpu { threads } => builder.with_intra_threads(threads)?,
    };
    let session = builder.commit_from_file(&self.model_path)?;
    info!("模型加载完成");

    let num_inputs = session.inputs.len();
    let num_outputs = session.outputs.len();

    if num_inputs != DOCNET_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        DOCNET_NUM_INPUTS, num_inputs
      );
      return Err(DocNetError::invalid(&format!(
        "预期模型输入数量为 {}, 实际为 {}",
        DOCNET_NUM_INPUTS, num_inputs
      )));
    }

    if num_outputs != DOCNET_NUM_OUTPUTS {
      error!(
        "预期模型输出数量为 {}, 实际为 {}",
        DOCNET_NUM_OUTPUTS, num_outputs
      );
      return Err(DocNetError::invalid(&format!(
        "预期模型输出数量为 {}, 实际为 {}",
        DOCNET_NUM_OUTPUTS, num_outputs
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_name = session.outputs[0].name.clone();
    debug!("模型输入: {}", input_name);
    debug!("模型输出: {}", output_name);

    Ok(DocNet {
      session,
      input_name,
      output_name,
    })
  }
}

impl DocNet {
  /// 把模型输出摊平成固定长度的得分数组
  fn postprocess(view: ArrayViewD<'_, f32>) -> Result<Scores, DocNetError> {
    let flat: Vec<f32> = view.iter().copied().collect();
    if flat.len() != DOC_CLASS_NUM {
      return Err(DocNetError::OutputShape {
        expected: DOC_CLASS_NUM,
        actual: flat.len(),
      });
    }
    let mut scores = [0.0f32; DOC_CLASS_NUM];
    scores.copy_from_slice(&flat);
    Ok(scores)
  }
}

impl Model for DocNet {
  type Input = InputTensor;
  type Output = Scores;
  type Error = DocNetError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let inputs = ort::inputs![self.input_name.as_str() => input.view()]?;

    debug!("执行模型推理");
    let outputs = self.session.run(inputs)?;

    debug!("获取模型输出");
    let tensor = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
    Self::postprocess(tensor)
  }
}
