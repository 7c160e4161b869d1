// 该文件是 Kanjian （看见） 项目的一部分。
// src/upload.rs - 上传文件校验与保存
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info};

/// 允许上传的图像扩展名（已排序）
pub const ALLOWED_EXTENSIONS: [&str; 8] = ["bmp", "gif", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

/// 上传校验失败的原因，显示文本直接返回给用户
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
  #[error("No file selected for upload.")]
  Missing,
  #[error("No file was chosen.")]
  EmptyFilename,
  #[error(
    "Invalid file type. Only image formats ({allowed}) are allowed. You uploaded a .{extension} file.",
    allowed = ALLOWED_EXTENSIONS.join(", ")
  )]
  InvalidType { extension: String },
}

/// 校验文件名，成功时返回小写扩展名。
///
/// 只检查最后一个 `.` 之后的部分，不读取文件内容。
pub fn validate(filename: &str) -> Result<String, UploadError> {
  if filename.is_empty() {
    return Err(UploadError::EmptyFilename);
  }

  match filename.rsplit_once('.') {
    Some((_, ext)) if ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => {
      Ok(ext.to_lowercase())
    }
    Some((_, ext)) if !ext.is_empty() => Err(UploadError::InvalidType {
      extension: ext.to_uppercase(),
    }),
    _ => Err(UploadError::InvalidType {
      extension: "Unknown".to_string(),
    }),
  }
}

/// 客户端提交的文件名只保留最后一段路径
pub fn client_file_name(raw: &str) -> &str {
  raw.rsplit(['/', '\\']).next().unwrap_or_default()
}

/// 上传文件的存储命名方式
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKey {
  /// 每次请求生成唯一文件名，同名上传互不覆盖
  #[default]
  Unique,
  /// 直接使用原始文件名，同名上传后写入者覆盖前者
  Original,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
  pub original_filename: String,
  /// 实际写入上传目录的文件名，检测器输出也沿用该名字
  pub stored_filename: String,
  pub storage_path: PathBuf,
  pub extension: String,
}

pub struct UploadStore {
  directory: PathBuf,
  key: StorageKey,
  counter: AtomicU16,
}

impl UploadStore {
  pub fn new(directory: impl Into<PathBuf>, key: StorageKey) -> Self {
    Self {
      directory: directory.into(),
      key,
      counter: AtomicU16::new(0),
    }
  }

  fn upload_id(&self) -> u16 {
    self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn stored_name(&self, filename: &str) -> String {
    match self.key {
      StorageKey::Original => filename.to_string(),
      StorageKey::Unique => format!(
        "{}-{:04X}-{}",
        Local::now().format("%Y%m%d-%H%M%S"),
        self.upload_id(),
        filename
      ),
    }
  }

  /// 保存已通过校验的上传内容
  pub fn save(
    &self,
    filename: &str,
    extension: String,
    bytes: &[u8],
  ) -> std::io::Result<UploadedImage> {
    if !self.directory.exists() {
      debug!("创建上传目录: {}", self.directory.display());
      std::fs::create_dir_all(&self.directory)?;
    }

    let stored_filename = self.stored_name(filename);
    let storage_path = self.directory.join(&stored_filename);
    std::fs::write(&storage_path, bytes)?;
    info!(
      "文件已保存: {} ({} 字节)",
      storage_path.display(),
      bytes.len()
    );

    Ok(UploadedImage {
      original_filename: filename.to_string(),
      stored_filename,
      storage_path,
      extension,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_allowed_extensions_case_insensitively() {
    assert_eq!(validate("cat.JPG"), Ok("jpg".to_string()));
    assert_eq!(validate("scan.tif"), Ok("tif".to_string()));
    assert_eq!(validate("archive.tar.PNG"), Ok("png".to_string()));
  }

  #[test]
  fn rejects_missing_or_empty_extension() {
    let unknown = UploadError::InvalidType {
      extension: "Unknown".to_string(),
    };
    assert_eq!(validate("cat"), Err(unknown.clone()));
    assert_eq!(validate("cat."), Err(unknown));
    assert_eq!(validate(""), Err(UploadError::EmptyFilename));
  }

  #[test]
  fn rejection_names_extension_and_allowed_set() {
    let err = validate("cat.exe").unwrap_err();
    let message = err.to_string();
    assert!(message.contains(".EXE file"));
    assert!(message.contains("(bmp, gif, jpeg, jpg, png, tif, tiff, webp)"));
  }

  #[test]
  fn client_name_drops_directories() {
    assert_eq!(client_file_name("../../etc/x.png"), "x.png");
    assert_eq!(client_file_name("C:\\photos\\dog.jpg"), "dog.jpg");
    assert_eq!(client_file_name("plain.gif"), "plain.gif");
    assert_eq!(client_file_name("dir/"), "");
  }

  #[test]
  fn unique_keys_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path(), StorageKey::Unique);

    let a = store.save("cat.png", "png".into(), b"first").unwrap();
    let b = store.save("cat.png", "png".into(), b"second").unwrap();

    assert_ne!(a.stored_filename, b.stored_filename);
    assert!(a.stored_filename.ends_with("-cat.png"));
    assert_eq!(std::fs::read(&a.storage_path).unwrap(), b"first");
    assert_eq!(std::fs::read(&b.storage_path).unwrap(), b"second");
  }

  #[test]
  fn original_key_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = UploadStore::new(dir.path().join("uploads"), StorageKey::Original);

    store.save("cat.png", "png".into(), b"first").unwrap();
    let second = store.save("cat.png", "png".into(), b"second").unwrap();

    assert_eq!(second.stored_filename, "cat.png");
    assert_eq!(std::fs::read(&second.storage_path).unwrap(), b"second");
  }
}
