// 该文件是 Wenfeng （文风） 项目的一部分。
// src/model.rs - 模型
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

use thiserror::Error;

use crate::FromUrl;

/// 分类类别数
pub const DOC_CLASS_NUM: usize = 3;

/// 模型输出：按类别索引排列的得分
pub type Scores = [f32; DOC_CLASS_NUM];

/// 模型输入：NHWC 排列的归一化张量，形状为 (1, H, W, 3)
pub type InputTensor = ndarray::Array4<f32>;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 文档分类标签，顺序与模型输出的类别索引一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocLabel {
  Report,
  Document,
  Non,
}

impl DocLabel {
  pub const ALL: [DocLabel; DOC_CLASS_NUM] = [DocLabel::Report, DocLabel::Document, DocLabel::Non];

  pub fn as_str(&self) -> &'static str {
    match self {
      DocLabel::Report => "report",
      DocLabel::Document => "document",
      DocLabel::Non => "non",
    }
  }

  pub fn from_index(index: usize) -> Option<Self> {
    Self::ALL.get(index).copied()
  }

  pub fn index(&self) -> usize {
    *self as usize
  }
}

impl std::fmt::Display for DocLabel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone)]
pub struct Recognition {
  pub label: DocLabel,
  pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ClassifyResult {
  pub items: Box<[Recognition]>,
}

impl ClassifyResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

mod fake;
pub use self::fake::{FakeModel, FakeModelError};

#[cfg(feature = "model_docnet")]
mod docnet;
#[cfg(feature = "model_docnet")]
pub use self::docnet::{Acceleration, DocNet, DocNetBuilder, DocNetError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_docnet")]
  #[error("DocNet model error: {0}")]
  DocNetError(#[from] DocNetError),
  #[error("Fake model error: {0}")]
  FakeModelError(#[from] FakeModelError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum ModelWrapper {
  #[cfg(feature = "model_docnet")]
  DocNet(DocNet),
  Fake(FakeModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "model_docnet")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == DocNetBuilder::SCHEME {
        let model = DocNetBuilder::from_url(url)?.build()?;
        return Ok(ModelWrapper::DocNet(model));
      }
    }
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == FakeModel::SCHEME {
        let model = FakeModel::from_url(url)?;
        return Ok(ModelWrapper::Fake(model));
      }
    }
    Err(ModelError::SchemeMismatch)
  }
}

impl Model for ModelWrapper {
  type Input = InputTensor;
  type Output = Scores;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      #[cfg(feature = "model_docnet")]
      ModelWrapper::DocNet(model) => Ok(model.infer(input)?),
      ModelWrapper::Fake(model) => Ok(model.infer(input)?),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_order_matches_class_index() {
    assert_eq!(DocLabel::from_index(0), Some(DocLabel::Report));
    assert_eq!(DocLabel::from_index(1), Some(DocLabel::Document));
    assert_eq!(DocLabel::from_index(2), Some(DocLabel::Non));
    assert_eq!(DocLabel::from_index(3), None);
    for (i, label) in DocLabel::ALL.iter().enumerate() {
      assert_eq!(label.index(), i);
    }
  }

  #[test]
  fn label_strings() {
    assert_eq!(DocLabel::Report.as_str(), "report");
    assert_eq!(DocLabel::Document.as_str(), "document");
    assert_eq!(DocLabel::Non.as_str(), "non");
    assert_eq!(format!("{}", DocLabel::Document), "document");
  }

  #[test]
  fn classify_result_len() {
    let empty = ClassifyResult { items: Box::new([]) };
    assert!(empty.is_empty());
    assert_eq!(empty.len(), 0);

    let one = ClassifyResult {
      items: Box::new([Recognition {
        label: DocLabel::Report,
        score: 0.9,
      }]),
    };
    assert!(!one.is_empty());
    assert_eq!(one.len(), 1);
  }

  #[test]
  fn wrapper_rejects_unknown_scheme() {
    let url = url::Url::parse("nope:///model").unwrap();
    assert!(matches!(
      ModelWrapper::from_url(&url),
      Err(ModelError::SchemeMismatch)
    ));
  }
}
