// 该文件是 Wenfeng （文风） 项目的一部分。
// src/input/v4l2_input.rs - V4L2 摄像头输入源
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

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Rotation, YuvFormat, YuvFrame},
};

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Invalid rotation: {0}")]
  InvalidRotation(String),
}

impl From<std::io::Error> for V4l2InputError {
  fn from(err: std::io::Error) -> Self {
    V4l2InputError::IoError(err)
  }
}

const V4L2_SCHEME: &str = "v4l2";

/// V4L2 摄像头输入源
///
/// 由于 v4l 库的 Stream 需要引用 Device，我们使用 Pin<Box> 来保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
pub struct V4l2Input {
  /// V4L2 设备（使用 Pin<Box> 固定内存位置）
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  /// 帧索引
  frame_index: u64,
  /// 视频宽度
  width: u32,
  /// 视频高度
  height: u32,
  /// 传递给每一帧的旋转提示
  rotation: Rotation,
  /// 开始时间
  start_time: Instant,
  /// 尚未释放的帧数
  in_flight: Arc<AtomicUsize>,
}

impl FromUrl for V4l2Input {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != V4L2_SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        V4L2_SCHEME,
        url.scheme()
      );
      return Err(V4l2InputError::SchemaMismatch);
    }

    // 预期格式: v4l2:///dev/video0?rotation=90
    let device_path = if url.path().is_empty() {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    let mut rotation = Rotation::Deg0;
    for (key, value) in url.query_pairs() {
      if key == "rotation" {
        rotation = value
          .parse::<u32>()
          .ok()
          .and_then(Rotation::from_degrees)
          .ok_or_else(|| V4l2InputError::InvalidRotation(value.to_string()))?;
      }
    }

    info!("打开摄像头设备: {}", device_path);
    let device = Box::pin(Device::with_path(&device_path)?);

    // 设置视频格式
    let mut format = device.format()?;
    format.width = 640;
    format.height = 480;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;

    let width = format.width;
    let height = format.height;
    debug!("协商的采集格式: {}x{} {}", width, height, format.fourcc);

    let mut source = Self {
      device,
      stream: None,
      frame_index: 0,
      width,
      height,
      rotation,
      start_time: Instant::now(),
      in_flight: Arc::new(AtomicUsize::new(0)),
    };

    // 创建捕获流
    // SAFETY: device 被 Pin<Box> 固定，不会移动，所以引用始终有效
    // Stream 的生命周期通过 source 的 Drop 来管理
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      // 将设备引用的生命周期延长到 'static
      // 这是安全的，因为:
      // 1. device 被 Pin<Box> 固定在堆上，不会移动
      // 2. stream 存储在同一个结构体中，会在 device 之前被 drop
      // 3. Drop 顺序：stream (Option::take) -> device
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, 4)?
    };

    source.stream = Some(stream);
    Ok(source)
  }
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = V4L2_SCHEME;
}

impl Drop for V4l2Input {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}

impl Iterator for V4l2Input {
  type Item = Result<YuvFrame, V4l2InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    match stream.next() {
      Ok((buffer, _meta)) => {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
          warn!("上一帧尚未释放, 同一时刻应只有一帧在处理中");
        }

        let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
        let index = self.frame_index;
        self.frame_index += 1;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let gauge = self.in_flight.clone();
        let frame = YuvFrame::new(YuvFormat::Yuyv, self.width, self.height, buffer.to_vec())
          .with_rotation(self.rotation)
          .with_index(index)
          .with_timestamp_ms(timestamp_ms)
          .with_release_hook(Box::new(move || {
            gauge.fetch_sub(1, Ordering::SeqCst);
          }));
        Some(Ok(frame))
      }
      Err(e) => Some(Err(e.into())),
    }
  }
}
