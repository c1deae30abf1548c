// 该文件是 Wenfeng （文风） 项目的一部分。
// src/model/fake.rs - 伪模型
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

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DOC_CLASS_NUM, InputTensor, Model, Scores},
};

/// 返回固定得分的伪模型，用于测试与无硬件演示
///
/// URL 形如 `fake:?scores=0.1,0.7,0.2`，可加 `fail` 参数模拟推理失败。
#[derive(Clone)]
pub struct FakeModel {
  scores: Scores,
  fail: bool,
  calls: Arc<AtomicUsize>,
}

#[derive(Error, Debug)]
pub enum FakeModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("得分参数错误: {0}")]
  ScoreParamError(String),
  #[error("模拟推理失败")]
  SimulatedFailure,
}

const FAKE_SCHEME: &str = "fake";

impl FromUrl for FakeModel {
  type Error = FakeModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != FAKE_SCHEME {
      return Err(FakeModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        FAKE_SCHEME
      )));
    }

    let mut model = FakeModel::with_scores([0.0; DOC_CLASS_NUM]);
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "scores" => {
          let parsed: Result<Vec<f32>, _> = value.split(',').map(str::parse::<f32>).collect();
          let parsed =
            parsed.map_err(|e| FakeModelError::ScoreParamError(format!("{}: {}", value, e)))?;
          if parsed.len() != DOC_CLASS_NUM {
            return Err(FakeModelError::ScoreParamError(format!(
              "需要 {} 个得分, 实际 {} 个",
              DOC_CLASS_NUM,
              parsed.len()
            )));
          }
          model.scores.copy_from_slice(&parsed);
        }
        "fail" => {
          model.fail = true;
        }
        _ => {}
      }
    }
    Ok(model)
  }
}

impl FromUrlWithScheme for FakeModel {
  const SCHEME: &'static str = FAKE_SCHEME;
}

impl FakeModel {
  pub fn with_scores(scores: Scores) -> Self {
    Self {
      scores,
      fail: false,
      calls: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn failing() -> Self {
    Self {
      fail: true,
      ..Self::with_scores([0.0; DOC_CLASS_NUM])
    }
  }

  /// 推理已被调用的次数（跨克隆共享）
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Model for FakeModel {
  type Input = InputTensor;
  type Output = Scores;
  type Error = FakeModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(FakeModelError::SimulatedFailure);
    }
    Ok(self.scores)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dummy_input() -> InputTensor {
    ndarray::Array4::zeros((1, 2, 2, 3))
  }

  #[test]
  fn parses_scores_from_url() {
    let url = Url::parse("fake:?scores=0.1,0.7,0.2").unwrap();
    let model = FakeModel::from_url(&url).unwrap();
    let scores = model.infer(&dummy_input()).unwrap();
    assert_eq!(scores, [0.1, 0.7, 0.2]);
  }

  #[test]
  fn rejects_wrong_score_count() {
    let url = Url::parse("fake:?scores=0.1,0.7").unwrap();
    assert!(matches!(
      FakeModel::from_url(&url),
      Err(FakeModelError::ScoreParamError(_))
    ));
  }

  #[test]
  fn fail_flag_simulates_inference_failure() {
    let url = Url::parse("fake:?fail").unwrap();
    let model = FakeModel::from_url(&url).unwrap();
    assert!(matches!(
      model.infer(&dummy_input()),
      Err(FakeModelError::SimulatedFailure)
    ));
    assert_eq!(model.calls(), 1);
  }

  #[test]
  fn call_counter_is_shared_across_clones() {
    let model = FakeModel::with_scores([0.5, 0.5, 0.5]);
    let probe = model.clone();
    model.infer(&dummy_input()).unwrap();
    model.infer(&dummy_input()).unwrap();
    assert_eq!(probe.calls(), 2);
  }
}
