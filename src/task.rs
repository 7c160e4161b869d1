// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 检测请求流水线
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

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
  artifact::{ResultArtifact, resolve},
  model::{Detection, Detector, DetectorError},
  stats::{ClassStatistics, aggregate},
  upload::{StorageKey, UploadError, UploadStore, UploadedImage, client_file_name, validate},
};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("{0}")]
  Rejected(#[from] UploadError),
  #[error("保存上传文件失败: {0}")]
  Storage(#[from] std::io::Error),
  #[error("检测失败: {0}")]
  Detector(#[from] DetectorError),
}

/// 一次检测请求的全部结果
#[derive(Debug, Clone)]
pub struct DetectionReport {
  pub upload: UploadedImage,
  pub artifact: ResultArtifact,
  pub statistics: ClassStatistics,
  pub detections: Vec<Detection>,
}

/// 保存 → 检测 → 统计 → 选择结果图像。
///
/// 整个过程是同步阻塞的，异步调用方应放到阻塞线程池中执行。
pub struct DetectionTask {
  detector: Arc<dyn Detector>,
  store: UploadStore,
}

impl DetectionTask {
  pub fn new(detector: Arc<dyn Detector>, upload_dir: impl Into<PathBuf>, key: StorageKey) -> Self {
    Self {
      detector,
      store: UploadStore::new(upload_dir, key),
    }
  }

  pub fn run(&self, raw_filename: &str, bytes: &[u8]) -> Result<DetectionReport, TaskError> {
    let filename = client_file_name(raw_filename);
    if filename.is_empty() {
      return Err(UploadError::EmptyFilename.into());
    }
    let extension = validate(filename)?;

    info!("开始任务: {}", filename);
    let upload = self.store.save(filename, extension, bytes)?;

    let now = std::time::Instant::now();
    let run = self.detector.detect(&upload.storage_path)?;
    info!(
      "检测完成，耗时: {:.2?}，共 {} 个对象",
      now.elapsed(),
      run.detections.len()
    );

    let statistics = aggregate(&run.detections);
    if !statistics.is_empty() {
      info!("统计: {}", statistics);
    }
    let artifact = resolve(&run, &upload);

    Ok(DetectionReport {
      upload,
      artifact,
      statistics,
      detections: run.detections,
    })
  }
}
