// 该文件是 Kanjian （看见） 项目的一部分。
// src/artifact.rs - 结果图像选择
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

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::UPLOAD_FOLDER;
use crate::model::DetectionRun;
use crate::upload::UploadedImage;

/// 结果链接中的逻辑目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalFolder {
  /// 上传目录
  Upload,
  /// 检测器输出目录的名称（仅目录名，不含路径）
  Run(String),
}

impl LogicalFolder {
  pub fn as_str(&self) -> &str {
    match self {
      LogicalFolder::Upload => UPLOAD_FOLDER,
      LogicalFolder::Run(name) => name.as_str(),
    }
  }
}

impl fmt::Display for LogicalFolder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
  pub logical_folder: LogicalFolder,
  pub filename: String,
  pub resolved_path: PathBuf,
}

/// 选择返回标注图像还是原图。
///
/// 只有一条转移规则：检测器输出目录中存在同名文件时为 `Annotated`，
/// 其余情况一律 `OriginalFallback`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPolicy {
  Annotated { folder: String, path: PathBuf },
  OriginalFallback,
}

impl ResolutionPolicy {
  pub fn decide(run: &DetectionRun, filename: &str) -> Self {
    let Some(output_dir) = run.output_dir.as_deref() else {
      return ResolutionPolicy::OriginalFallback;
    };

    let candidate = output_dir.join(filename);
    match (candidate.is_file(), folder_name(output_dir)) {
      (true, Some(folder)) => ResolutionPolicy::Annotated {
        folder,
        path: candidate,
      },
      (true, None) => {
        warn!("检测器输出目录无法作为结果链接: {}", output_dir.display());
        ResolutionPolicy::OriginalFallback
      }
      (false, _) => {
        warn!(
          "未在 {} 中找到标注图像，回退到原始图像",
          output_dir.display()
        );
        ResolutionPolicy::OriginalFallback
      }
    }
  }
}

fn folder_name(dir: &Path) -> Option<String> {
  let name = dir.file_name()?.to_str()?;
  (name != UPLOAD_FOLDER).then(|| name.to_string())
}

/// 根据检测结果确定要返回给用户的图像，永远不会失败
pub fn resolve(run: &DetectionRun, upload: &UploadedImage) -> ResultArtifact {
  let filename = upload.stored_filename.clone();
  let artifact = match ResolutionPolicy::decide(run, &filename) {
    ResolutionPolicy::Annotated { folder, path } => ResultArtifact {
      logical_folder: LogicalFolder::Run(folder),
      filename,
      resolved_path: path,
    },
    ResolutionPolicy::OriginalFallback => ResultArtifact {
      logical_folder: LogicalFolder::Upload,
      filename,
      resolved_path: upload.storage_path.clone(),
    },
  };

  info!(
    "返回结果: 目录 {} 文件 {}",
    artifact.logical_folder, artifact.filename
  );
  artifact
}
