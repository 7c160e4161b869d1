// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 服务主程序
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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kanjian::{
  FromUrl,
  args::Args,
  model::UltralyticsBuilder,
  serve::ResultServer,
  task::DetectionTask,
  web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("上传目录: {}", args.upload_dir.display());
  info!("结果目录: {}", args.results_dir.display());
  info!("检测器: {}", args.model);
  info!("命名方式: {:?}", args.storage_key);

  for dir in [&args.upload_dir, &args.results_dir] {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录: {}", dir.display()))?;
  }

  let detector = UltralyticsBuilder::from_url(&args.model)
    .context("检测器地址无效")?
    .results_root(&args.results_dir)
    .build();

  let task = DetectionTask::new(Arc::new(detector), &args.upload_dir, args.storage_key);
  let server = ResultServer::new(&args.upload_dir, &args.results_dir);

  web::run(args.listen, AppState::new(task, server), args.max_upload_bytes()).await
}
