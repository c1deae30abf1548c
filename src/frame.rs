// 该文件是 Wenfeng （文风） 项目的一部分。
// src/frame.rs - 摄像头帧定义
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

/// 帧像素编码（YUV 家族）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YuvFormat {
  /// 平面 4:2:0（Y 平面 + U 平面 + V 平面）
  I420,
  /// 半平面 4:2:0（Y 平面 + UV 交错平面）
  Nv12,
  /// 打包 4:2:2（Y0 U Y1 V）
  Yuyv,
}

impl YuvFormat {
  /// 给定尺寸下的帧数据字节数，超出 usize 表示范围时饱和为 usize::MAX
  pub fn expected_len(&self, width: u32, height: u32) -> usize {
    let (w, h) = (width as u128, height as u128);
    let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
    let total = match self {
      YuvFormat::I420 | YuvFormat::Nv12 => w * h + 2 * cw * ch,
      YuvFormat::Yuyv => w * h * 2,
    };
    usize::try_from(total).unwrap_or(usize::MAX)
  }
}

/// 帧旋转提示，仅支持四个直角方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  #[default]
  Deg0,
  Deg90,
  Deg180,
  Deg270,
}

impl Rotation {
  pub fn from_degrees(degrees: u32) -> Option<Self> {
    match degrees {
      0 => Some(Rotation::Deg0),
      90 => Some(Rotation::Deg90),
      180 => Some(Rotation::Deg180),
      270 => Some(Rotation::Deg270),
      _ => None,
    }
  }

  pub fn degrees(&self) -> u32 {
    match self {
      Rotation::Deg0 => 0,
      Rotation::Deg90 => 90,
      Rotation::Deg180 => 180,
      Rotation::Deg270 => 270,
    }
  }
}

/// 帧释放回调，在帧被丢弃时恰好调用一次
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// 帧的元信息，在帧被消费后仍可用于输出
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
  pub index: u64,
  pub timestamp_ms: u64,
}

/// 摄像头帧
///
/// 帧由输入源借出；分类器以值传递的方式消费帧，帧在离开作用域时
/// 自动归还（触发释放回调）。无论分类成功与否，归还恰好发生一次。
pub struct YuvFrame {
  format: YuvFormat,
  width: u32,
  height: u32,
  rotation: Rotation,
  data: Box<[u8]>,
  index: u64,
  timestamp_ms: u64,
  release: Option<ReleaseHook>,
}

impl YuvFrame {
  pub fn new(format: YuvFormat, width: u32, height: u32, data: Vec<u8>) -> Self {
    Self {
      format,
      width,
      height,
      rotation: Rotation::Deg0,
      data: data.into_boxed_slice(),
      index: 0,
      timestamp_ms: 0,
      release: None,
    }
  }

  pub fn with_rotation(mut self, rotation: Rotation) -> Self {
    self.rotation = rotation;
    self
  }

  pub fn with_index(mut self, index: u64) -> Self {
    self.index = index;
    self
  }

  pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
    self.timestamp_ms = timestamp_ms;
    self
  }

  pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
    self.release = Some(hook);
    self
  }

  pub fn format(&self) -> YuvFormat {
    self.format
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn index(&self) -> u64 {
    self.index
  }

  pub fn timestamp_ms(&self) -> u64 {
    self.timestamp_ms
  }

  pub fn meta(&self) -> FrameMeta {
    FrameMeta {
      index: self.index,
      timestamp_ms: self.timestamp_ms,
    }
  }

  /// 帧是否携带完整的像素数据
  ///
  /// 直播流中丢帧是常态：源可能交付空缓冲或截断缓冲。
  /// 这类帧跳过分类，不算错误。
  pub fn has_pixels(&self) -> bool {
    self.width > 0
      && self.height > 0
      && self.data.len() >= self.format.expected_len(self.width, self.height)
  }
}

impl Drop for YuvFrame {
  fn drop(&mut self) {
    if let Some(hook) = self.release.take() {
      hook();
    }
  }
}

impl std::fmt::Debug for YuvFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("YuvFrame")
      .field("format", &self.format)
      .field("width", &self.width)
      .field("height", &self.height)
      .field("rotation", &self.rotation)
      .field("len", &self.data.len())
      .field("index", &self.index)
      .field("timestamp_ms", &self.timestamp_ms)
      .finish()
  }
}
