// 该文件是 Wenfeng （文风） 项目的一部分。
// tests/pipeline.rs - 端到端管线测试
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

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use image::RgbImage;
use url::Url;

use wenfeng::{
  FromUrl,
  analyzer::FrameAnalyzer,
  convert::rgb_to_i420,
  frame::{YuvFormat, YuvFrame},
  model::FakeModel,
  task::{ContinuousTask, OneShotTask, Task},
};

fn i420_frame(width: u32, height: u32, index: u64, released: &Arc<AtomicUsize>) -> YuvFrame {
  let rgb = RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200]));
  let counter = Arc::clone(released);
  YuvFrame::new(YuvFormat::I420, width, height, rgb_to_i420(&rgb))
    .with_index(index)
    .with_timestamp_ms(index * 33)
    .with_release_hook(Box::new(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    }))
}

#[cfg(all(feature = "read_image_file", feature = "record_output"))]
#[test]
fn oneshot_pipeline_writes_one_record_line() {
  let dir = std::env::temp_dir().join("wenfeng-pipeline-oneshot");
  std::fs::create_dir_all(&dir).unwrap();
  let image_path = dir.join("input.png");
  let record_path = dir.join("result.jsonl");
  let _ = std::fs::remove_file(&record_path);

  RgbImage::from_pixel(32, 24, image::Rgb([255, 255, 255]))
    .save(&image_path)
    .unwrap();

  let input_url = Url::parse(&format!("image:{}", image_path.display())).unwrap();
  let output_url = Url::parse(&format!("record:{}?always", record_path.display())).unwrap();
  let input = wenfeng::input::ImageFileInput::from_url(&input_url).unwrap();
  let output = wenfeng::output::RecordOutput::from_url(&output_url).unwrap();
  let analyzer = FrameAnalyzer::new(FakeModel::with_scores([0.1, 0.7, 0.2]));

  OneShotTask.run_task(input, analyzer, output).unwrap();

  let text = std::fs::read_to_string(&record_path).unwrap();
  let lines: Vec<&str> = text.lines().collect();
  assert_eq!(lines.len(), 1, "一帧应只写入一行记录");

  let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
  assert_eq!(value["frame"], 0);
  let items = value["items"].as_array().unwrap();
  assert_eq!(items.len(), 1, "只有 document 超过阈值");
  assert_eq!(items[0]["label"], "document");
  let score = items[0]["score"].as_f64().unwrap();
  assert!((score - 0.7).abs() < 1e-6, "分数应原样记录: {}", score);

  let _ = std::fs::remove_file(&image_path);
  let _ = std::fs::remove_file(&record_path);
}

#[cfg(feature = "record_output")]
#[test]
fn continuous_pipeline_records_and_releases_every_frame() {
  let dir = std::env::temp_dir().join("wenfeng-pipeline-continuous");
  std::fs::create_dir_all(&dir).unwrap();
  let record_path = dir.join("stream.jsonl");
  let _ = std::fs::remove_file(&record_path);

  let released = Arc::new(AtomicUsize::new(0));
  let frames: Vec<Result<YuvFrame, wenfeng::input::InputError>> = (0..3)
    .map(|i| Ok(i420_frame(16, 12, i, &released)))
    .collect();

  let output_url = Url::parse(&format!("record:{}", record_path.display())).unwrap();
  let output = wenfeng::output::RecordOutput::from_url(&output_url).unwrap();
  let model = FakeModel::with_scores([0.8, 0.5, 0.1]);
  let probe = model.clone();

  ContinuousTask::default()
    .with_frame_number(Some(3))
    .run_task(frames.into_iter(), FrameAnalyzer::new(model), output)
    .unwrap();

  assert_eq!(probe.calls(), 3, "每帧推理一次");
  assert_eq!(released.load(Ordering::SeqCst), 3, "每帧分析后都应释放");

  let text = std::fs::read_to_string(&record_path).unwrap();
  assert_eq!(text.lines().count(), 3);
  for line in text.lines() {
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    let items = value["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["label"], "report");
    assert_eq!(items[1]["label"], "document");
  }

  let _ = std::fs::remove_file(&record_path);
}

/// 与二进制入口一致的 URL 组装方式
#[cfg(feature = "read_image_file")]
#[test]
fn url_wiring_matches_binary_composition() {
  let dir = std::env::temp_dir().join("wenfeng-pipeline-wiring");
  std::fs::create_dir_all(&dir).unwrap();
  let image_path = dir.join("input.png");
  RgbImage::from_pixel(8, 8, image::Rgb([30, 60, 90]))
    .save(&image_path)
    .unwrap();

  let input_url = Url::parse(&format!("image:{}?rotation=180", image_path.display())).unwrap();
  let model_url = Url::parse("fake:?scores=0.2,0.1,0.9").unwrap();
  let output_url = Url::parse("console:").unwrap();

  let input = wenfeng::input::InputWrapper::from_url(&input_url).unwrap();
  let model = wenfeng::model::ModelWrapper::from_url(&model_url).unwrap();
  let output = wenfeng::output::OutputWrapper::from_url(&output_url).unwrap();

  OneShotTask
    .run_task(input, FrameAnalyzer::new(model), output)
    .unwrap();

  let _ = std::fs::remove_file(&image_path);
}
