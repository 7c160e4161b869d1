// 该文件是 Kanjian （看见） 项目的一部分。
// src/serve.rs - 结果图像读取
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

use thiserror::Error;
use tracing::{debug, warn};

use crate::UPLOAD_FOLDER;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum ServeError {
  #[error("文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("非法的结果路径: {0}")]
  InvalidReference(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

impl ServeError {
  /// 对调用方而言同样是“找不到”
  pub fn is_not_found(&self) -> bool {
    matches!(self, ServeError::NotFound(_) | ServeError::InvalidReference(_))
  }
}

#[derive(Debug, Clone)]
pub struct ServedArtifact {
  pub bytes: Vec<u8>,
  pub content_type: &'static str,
}

/// 按扩展名推断 MIME 类型
pub fn content_type_for(filename: &str) -> &'static str {
  let ext = match filename.rsplit_once('.') {
    Some((_, ext)) => ext.to_lowercase(),
    None => return OCTET_STREAM,
  };

  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "bmp" => "image/bmp",
    "tif" | "tiff" => "image/tiff",
    _ => OCTET_STREAM,
  }
}

// 只允许单段路径
fn is_plain_component(name: &str) -> bool {
  !name.is_empty()
    && name != "."
    && name != ".."
    && !name.contains(['/', '\\', '\0'])
}

#[derive(Debug, Clone)]
pub struct ResultServer {
  upload_dir: PathBuf,
  results_root: PathBuf,
}

impl ResultServer {
  pub fn new(upload_dir: impl Into<PathBuf>, results_root: impl Into<PathBuf>) -> Self {
    Self {
      upload_dir: upload_dir.into(),
      results_root: results_root.into(),
    }
  }

  fn base_directory(&self, logical_folder: &str) -> PathBuf {
    if logical_folder == UPLOAD_FOLDER {
      self.upload_dir.clone()
    } else {
      self.results_root.join(logical_folder)
    }
  }

  /// 把逻辑引用解析成磁盘上的文件，保证不会离开对应的基础目录
  pub fn locate(&self, logical_folder: &str, filename: &str) -> Result<PathBuf, ServeError> {
    for part in [logical_folder, filename] {
      if !is_plain_component(part) {
        return Err(ServeError::InvalidReference(part.to_string()));
      }
    }

    let base = self.base_directory(logical_folder);
    let path = base.join(filename);
    if !path.is_file() {
      return Err(ServeError::NotFound(path));
    }

    // 防止符号链接指向目录之外
    let canonical = path.canonicalize()?;
    let root = if logical_folder == UPLOAD_FOLDER {
      self.upload_dir.canonicalize()?
    } else {
      self.results_root.canonicalize()?
    };
    if !canonical.starts_with(&root) {
      return Err(ServeError::InvalidReference(format!(
        "{}/{}",
        logical_folder, filename
      )));
    }

    Ok(canonical)
  }

  pub async fn serve(
    &self,
    logical_folder: &str,
    filename: &str,
  ) -> Result<ServedArtifact, ServeError> {
    let path = match self.locate(logical_folder, filename) {
      Ok(path) => path,
      Err(e) => {
        warn!("无法提供结果图像 {}/{}: {}", logical_folder, filename, e);
        return Err(e);
      }
    };

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
      std::io::ErrorKind::NotFound => ServeError::NotFound(path.clone()),
      _ => ServeError::Io(e),
    })?;
    debug!("返回文件 {} ({} 字节)", path.display(), bytes.len());

    Ok(ServedArtifact {
      bytes,
      content_type: content_type_for(filename),
    })
  }

  pub fn upload_dir(&self) -> &Path {
    &self.upload_dir
  }

  pub fn results_root(&self) -> &Path {
    &self.results_root
  }
}
