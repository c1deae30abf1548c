// 该文件是 Wenfeng （文风） 项目的一部分。
// src/input/image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  convert::rgb_to_i420,
  frame::{Rotation, YuvFormat, YuvFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
  #[error("Invalid rotation: {0}")]
  InvalidRotation(String),
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileInputError {
  fn from(err: image::ImageError) -> Self {
    ImageFileInputError::ImageLoadError(err)
  }
}

const IMAGE_FILE_SCHEME: &str = "image";

/// 单张图片输入，解码后编码为 I420 帧，走与摄像头一致的处理路径
pub struct ImageFileInput {
  frame: Option<YuvFrame>,
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != IMAGE_FILE_SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        IMAGE_FILE_SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let mut rotation = Rotation::Deg0;
    for (key, value) in url.query_pairs() {
      if key == "rotation" {
        rotation = value
          .parse::<u32>()
          .ok()
          .and_then(Rotation::from_degrees)
          .ok_or_else(|| ImageFileInputError::InvalidRotation(value.to_string()))?;
      }
    }

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?;
    let rgb = image.into_rgb8();
    let frame =
      YuvFrame::new(YuvFormat::I420, rgb.width(), rgb.height(), rgb_to_i420(&rgb))
        .with_rotation(rotation);

    Ok(ImageFileInput {
      frame: Some(frame),
    })
  }
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = IMAGE_FILE_SCHEME;
}

impl Iterator for ImageFileInput {
  type Item = Result<YuvFrame, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take().map(Ok)
  }
}
