// 该文件是 Wenfeng （文风） 项目的一部分。
// src/convert.rs - YUV 与 RGB 之间的像素格式转换
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

//! YUV 帧到 RGBA 位图的转换（BT.601 系数），以及图片输入用的反向转换。

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::frame::{YuvFormat, YuvFrame};

#[derive(Debug, Error)]
pub enum ConvertError {
  #[error("帧数据不完整: 期望至少 {expected} 字节, 实际 {actual} 字节")]
  ShortBuffer { expected: usize, actual: usize },
}

#[inline]
fn yuv_pixel(y: f32, u: f32, v: f32) -> Rgba<u8> {
  let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
  let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
  let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
  Rgba([r, g, b, 255])
}

/// 将一帧 YUV 数据转换写入 RGBA 位图
///
/// 位图尺寸与帧不一致时会重新分配，其余情况复用已有缓冲。
pub fn convert_into(frame: &YuvFrame, rgba: &mut RgbaImage) -> Result<(), ConvertError> {
  let (w, h) = (frame.width(), frame.height());
  let expected = frame.format().expected_len(w, h);
  if frame.data().len() < expected || expected == 0 {
    return Err(ConvertError::ShortBuffer {
      expected,
      actual: frame.data().len(),
    });
  }

  if rgba.dimensions() != (w, h) {
    *rgba = RgbaImage::new(w, h);
  }

  match frame.format() {
    YuvFormat::I420 => i420_into(frame.data(), w, h, rgba),
    YuvFormat::Nv12 => nv12_into(frame.data(), w, h, rgba),
    YuvFormat::Yuyv => yuyv_into(frame.data(), w, h, rgba),
  }
  Ok(())
}

fn i420_into(data: &[u8], width: u32, height: u32, rgba: &mut RgbaImage) {
  let (w, h) = (width as usize, height as usize);
  let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
  let y_plane = &data[..w * h];
  let u_plane = &data[w * h..w * h + cw * ch];
  let v_plane = &data[w * h + cw * ch..];

  for py in 0..h {
    for px in 0..w {
      let y = y_plane[py * w + px] as f32;
      let ci = (py / 2) * cw + px / 2;
      let u = u_plane[ci] as f32 - 128.0;
      let v = v_plane[ci] as f32 - 128.0;
      rgba.put_pixel(px as u32, py as u32, yuv_pixel(y, u, v));
    }
  }
}

fn nv12_into(data: &[u8], width: u32, height: u32, rgba: &mut RgbaImage) {
  let (w, h) = (width as usize, height as usize);
  let cw = (w + 1) / 2;
  let y_plane = &data[..w * h];
  let uv_plane = &data[w * h..];

  for py in 0..h {
    for px in 0..w {
      let y = y_plane[py * w + px] as f32;
      let ci = ((py / 2) * cw + px / 2) * 2;
      let u = uv_plane[ci] as f32 - 128.0;
      let v = uv_plane[ci + 1] as f32 - 128.0;
      rgba.put_pixel(px as u32, py as u32, yuv_pixel(y, u, v));
    }
  }
}

fn yuyv_into(data: &[u8], width: u32, height: u32, rgba: &mut RgbaImage) {
  let (w, h) = (width as usize, height as usize);

  for py in 0..h {
    let row = &data[py * w * 2..(py + 1) * w * 2];
    let mut px = 0u32;
    // 每 4 字节为一组 Y0 U Y1 V，覆盖两个像素
    let mut last_uv = (0.0f32, 0.0f32);
    for chunk in row.chunks_exact(4) {
      let y0 = chunk[0] as f32;
      let u = chunk[1] as f32 - 128.0;
      let y1 = chunk[2] as f32;
      let v = chunk[3] as f32 - 128.0;
      last_uv = (u, v);

      // 第一个像素
      rgba.put_pixel(px, py as u32, yuv_pixel(y0, u, v));
      px += 1;
      if px as usize >= w {
        break;
      }
      // 第二个像素
      rgba.put_pixel(px, py as u32, yuv_pixel(y1, u, v));
      px += 1;
    }
    // 奇数宽度时行尾残留孤立的 Y，沿用上一组色度
    let rest = row.chunks_exact(4).remainder();
    if (px as usize) < w && rest.len() >= 2 {
      let y = rest[0] as f32;
      rgba.put_pixel(px, py as u32, yuv_pixel(y, last_uv.0, last_uv.1));
    }
  }
}

/// 将 RGB 图像编码为 I420 平面数据，色度按 2x2 块取平均
///
/// 图片文件输入用它伪装成摄像头帧，走与直播流完全相同的转换路径。
pub fn rgb_to_i420(rgb: &image::RgbImage) -> Vec<u8> {
  let (w, h) = (rgb.width() as usize, rgb.height() as usize);
  let (cw, ch) = ((w + 1) / 2, (h + 1) / 2);
  let mut data = vec![0u8; YuvFormat::I420.expected_len(rgb.width(), rgb.height())];
  let (y_part, uv_part) = data.split_at_mut(w * h);
  let (u_part, v_part) = uv_part.split_at_mut(cw * ch);

  for py in 0..h {
    for px in 0..w {
      let p = rgb.get_pixel(px as u32, py as u32);
      let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
      let y = 0.299 * r + 0.587 * g + 0.114 * b;
      y_part[py * w + px] = y.clamp(0.0, 255.0) as u8;
    }
  }

  for cy in 0..ch {
    for cx in 0..cw {
      // 色度取 2x2 块内像素的平均值，边缘的残块按实际像素数平均
      let (mut sr, mut sg, mut sb) = (0.0f32, 0.0f32, 0.0f32);
      let mut n = 0.0f32;
      for dy in 0..2 {
        for dx in 0..2 {
          let (px, py) = (cx * 2 + dx, cy * 2 + dy);
          if px < w && py < h {
            let p = rgb.get_pixel(px as u32, py as u32);
            sr += p[0] as f32;
            sg += p[1] as f32;
            sb += p[2] as f32;
            n += 1.0;
          }
        }
      }
      let (r, g, b) = (sr / n, sg / n, sb / n);
      let u = -0.169 * r - 0.331 * g + 0.5 * b + 128.0;
      let v = 0.5 * r - 0.419 * g - 0.081 * b + 128.0;
      u_part[cy * cw + cx] = u.clamp(0.0, 255.0) as u8;
      v_part[cy * cw + cx] = v.clamp(0.0, 255.0) as u8;
    }
  }

  data
}
