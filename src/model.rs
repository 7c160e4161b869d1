// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 检测器抽象
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

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use thiserror::Error;

/// 外部检测器。进程启动时构建一次，之后注入每次请求的流水线。
pub trait Detector: Send + Sync {
  fn detect(&self, image_path: &Path) -> Result<DetectionRun, DetectorError>;
}

/// 单个检测目标，边界框为归一化的中心点与宽高
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub label: String,
  #[serde(skip)]
  pub class_id: usize,
  #[serde(serialize_with = "display_confidence")]
  pub confidence: f32,
  pub x_center: f32,
  pub y_center: f32,
  pub width: f32,
  pub height: f32,
}

// 返回给页面的置信度保留两位小数，统计使用原始值
fn display_confidence<S: Serializer>(confidence: &f32, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_f64((*confidence as f64 * 100.0).round() / 100.0)
}

/// 一次检测的结果
#[derive(Debug, Clone, Default)]
pub struct DetectionRun {
  /// 没有检测到目标时为空，这不是错误
  pub detections: Vec<Detection>,
  /// 检测器保存标注图像的目录（如果有）
  pub output_dir: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("无法执行检测器 {program} (请确保已安装): {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error("检测器执行失败 ({status}): {stderr}")]
  Failed {
    status: std::process::ExitStatus,
    stderr: String,
  },
  #[error("读取检测结果失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("检测结果格式错误: {0}")]
  Malformed(String),
  #[error("检测器地址错误: {0}")]
  InvalidUrl(String),
}

mod coco;
pub use self::coco::ClassNames;

mod ultralytics;
pub use self::ultralytics::{
  CONFIDENCE_THRESHOLD, IOU_THRESHOLD, UltralyticsBuilder, UltralyticsDetector,
};
