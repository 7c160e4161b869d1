// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/coco.rs - COCO 类别名称表
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

use std::path::Path;

use crate::model::DetectorError;

/// yolov8n 等 COCO 预训练权重的类别名称，下标即类别编号
const COCO_CLASSES: [&str; 80] = [
  "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
  "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
  "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
  "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
  "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
  "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
  "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
  "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
  "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
  "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// 类别编号到名称的映射，需与加载的权重一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
  pub fn coco() -> Self {
    Self(COCO_CLASSES.iter().map(|name| name.to_string()).collect())
  }

  /// 每行一个类别名称，行号（从 0 开始）即类别编号，忽略空行
  pub fn from_file(path: &Path) -> Result<Self, DetectorError> {
    let content = std::fs::read_to_string(path)?;
    let names: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    if names.is_empty() {
      return Err(DetectorError::InvalidUrl(format!(
        "类别文件为空: {}",
        path.display()
      )));
    }
    Ok(Self(names))
  }

  pub(crate) fn len(&self) -> usize {
    self.0.len()
  }

  /// 超出范围时返回 `Unknown`
  pub fn name(&self, class_id: usize) -> &str {
    self.0.get(class_id).map(String::as_str).unwrap_or("Unknown")
  }
}
