// 该文件是 Wenfeng （文风） 项目的一部分。
// src/output/record.rs - 记录输出
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

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FrameMeta,
  model::ClassifyResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把识别结果逐行追加为 JSON 记录
///
/// 默认跳过空结果，带 `always` 参数时每帧都会记录一行。
pub struct RecordOutput {
  path: PathBuf,
  always: bool,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch);
    }

    let always = url.query_pairs().any(|(k, _)| k == "always");
    let path = PathBuf::from(url.path());
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() && !parent.exists() {
        std::fs::create_dir_all(parent)?;
      }
    }

    Ok(RecordOutput { path, always })
  }
}

impl Render<FrameMeta, ClassifyResult> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, frame: &FrameMeta, result: &ClassifyResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let items: Vec<serde_json::Value> = result
      .items
      .iter()
      .map(|r| serde_json::json!({ "label": r.label.as_str(), "score": r.score }))
      .collect();
    let line = serde_json::json!({
      "time": Utc::now().to_rfc3339(),
      "frame": frame.index,
      "timestamp_ms": frame.timestamp_ms,
      "items": items,
    });

    let mut file = std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;
    writeln!(file, "{}", line)?;
    Ok(())
  }
}
