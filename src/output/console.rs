// 该文件是 Wenfeng （文风） 项目的一部分。
// src/output/console.rs - 控制台输出
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FrameMeta,
  model::ClassifyResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 把识别结果按百分比打印到日志
pub struct ConsoleOutput;

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }
    Ok(ConsoleOutput)
  }
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl Render<FrameMeta, ClassifyResult> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &FrameMeta, result: &ClassifyResult) -> Result<(), Self::Error> {
    if result.is_empty() {
      debug!("帧 {} 无超过阈值的类别", frame.index);
      return Ok(());
    }
    for item in result.items.iter() {
      info!("帧 {} 识别: {}: {:.1}%", frame.index, item.label, item.score * 100.0);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DocLabel, Recognition};

  #[test]
  fn renders_empty_and_nonempty_results() {
    let output = ConsoleOutput::from_url(&Url::parse("console:").unwrap()).unwrap();
    let meta = FrameMeta {
      index: 7,
      timestamp_ms: 1234,
    };

    let empty = ClassifyResult { items: Box::new([]) };
    output.render_result(&meta, &empty).unwrap();

    let result = ClassifyResult {
      items: Box::new([Recognition {
        label: DocLabel::Document,
        score: 0.876,
      }]),
    };
    output.render_result(&meta, &result).unwrap();
  }
}
