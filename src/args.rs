// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::upload::StorageKey;

/// Kanjian 图像目标检测服务
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, default_value = "127.0.0.1:5000", value_name = "ADDR")]
  pub listen: SocketAddr,

  /// 上传文件保存目录
  #[arg(long, default_value = "uploads", value_name = "DIR")]
  pub upload_dir: PathBuf,

  /// 检测器输出根目录，每次检测在其下创建子目录
  #[arg(long, default_value = "runs/detect", value_name = "DIR")]
  pub results_dir: PathBuf,

  /// 检测器地址
  /// 格式: yolo:<权重文件>[?bin=<yolo 可执行文件>][&names=<类别文件>]
  /// 默认权重之外的模型必须提供 names（每行一个类别名称）
  /// 置信度阈值 (0.25) 与 NMS 阈值 (0.4) 固定，不可配置
  #[arg(long, default_value = "yolo:yolov8n.pt", value_name = "MODEL")]
  pub model: Url,

  /// 上传文件命名方式
  #[arg(long, value_enum, default_value_t = StorageKey::Unique)]
  pub storage_key: StorageKey,

  /// 上传大小上限 (MB)
  #[arg(long, default_value_t = 16, value_name = "MB")]
  pub max_upload_mb: usize,
}

impl Args {
  pub fn max_upload_bytes(&self) -> usize {
    self.max_upload_mb.saturating_mul(1024 * 1024)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let args = Args::parse_from(["kanjian"]);
    assert_eq!(args.listen, "127.0.0.1:5000".parse().unwrap());
    assert_eq!(args.upload_dir, PathBuf::from("uploads"));
    assert_eq!(args.results_dir, PathBuf::from("runs/detect"));
    assert_eq!(args.model.scheme(), "yolo");
    assert_eq!(args.model.path(), "yolov8n.pt");
    assert_eq!(args.storage_key, StorageKey::Unique);
    assert_eq!(args.max_upload_bytes(), 16 * 1024 * 1024);
  }

  #[test]
  fn overrides() {
    let args = Args::parse_from([
      "kanjian",
      "--listen",
      "0.0.0.0:8080",
      "--storage-key",
      "original",
      "--model",
      "yolo:yolov8s.pt?bin=/opt/yolo",
    ]);
    assert_eq!(args.listen.port(), 8080);
    assert_eq!(args.storage_key, StorageKey::Original);
    assert_eq!(args.model.query(), Some("bin=/opt/yolo"));
  }
}
