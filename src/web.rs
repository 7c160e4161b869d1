// 该文件是 Kanjian （看见） 项目的一部分。
// src/web.rs - HTTP 服务
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
use std::sync::Arc;

use anyhow::Context;
use axum::{
  Router,
  extract::{DefaultBodyLimit, Multipart, Path, Query, State},
  http::{StatusCode, header},
  response::{Html, IntoResponse, Redirect, Response},
  routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
  serve::{ResultServer, ServeError, ServedArtifact},
  task::{DetectionTask, TaskError},
  upload::UploadError,
};

mod view;

const PROCESSING_FAILED: &str = "Processing failed. Please try another image.";
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
  task: Arc<DetectionTask>,
  server: Arc<ResultServer>,
}

impl AppState {
  pub fn new(task: DetectionTask, server: ResultServer) -> Self {
    Self {
      task: Arc::new(task),
      server: Arc::new(server),
    }
  }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(index).post(upload))
    .route("/results/{folder}/{filename}", get(result_image))
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 运行 HTTP 服务直到收到 Ctrl-C
pub async fn run(listen: SocketAddr, state: AppState, max_upload_bytes: usize) -> anyhow::Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("无法监听地址: {}", listen))?;
  info!(addr = %listen, "服务已启动");

  axum::serve(listener, router(state, max_upload_bytes))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  warn!("收到中断信号，准备退出...");
}

#[derive(Debug, Deserialize)]
struct IndexQuery {
  error: Option<String>,
}

async fn index(Query(query): Query<IndexQuery>) -> Html<String> {
  Html(view::render_index(query.error.as_deref()))
}

fn redirect_with_error(message: &str) -> Response {
  Redirect::to(&format!("/?error={}", urlencoding::encode(message))).into_response()
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
  let mut upload = None;
  loop {
    match multipart.next_field().await {
      Ok(Some(field)) if field.name() == Some(UPLOAD_FIELD) => {
        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
          Ok(bytes) => upload = Some((filename, bytes)),
          Err(e) => {
            warn!("读取上传内容失败: {}", e);
            return redirect_with_error(PROCESSING_FAILED);
          }
        }
        break;
      }
      Ok(Some(_)) => continue,
      Ok(None) => break,
      Err(e) => {
        warn!("解析上传表单失败: {}", e);
        return redirect_with_error(PROCESSING_FAILED);
      }
    }
  }

  let Some((filename, bytes)) = upload else {
    return redirect_with_error(&UploadError::Missing.to_string());
  };

  let task = state.task.clone();
  let outcome = tokio::task::spawn_blocking(move || task.run(&filename, &bytes)).await;

  match outcome {
    Ok(Ok(report)) => match view::render_result(&report) {
      Ok(page) => Html(page).into_response(),
      Err(e) => {
        error!("渲染结果页面失败: {}", e);
        redirect_with_error(PROCESSING_FAILED)
      }
    },
    Ok(Err(TaskError::Rejected(reason))) => {
      info!("拒绝上传: {}", reason);
      redirect_with_error(&reason.to_string())
    }
    Ok(Err(e)) => {
      error!("处理上传失败: {}", e);
      redirect_with_error(PROCESSING_FAILED)
    }
    Err(e) => {
      error!("检测任务异常退出: {}", e);
      redirect_with_error(PROCESSING_FAILED)
    }
  }
}

fn artifact_response(served: Result<ServedArtifact, ServeError>) -> Response {
  match served {
    Ok(artifact) => (
      [(header::CONTENT_TYPE, artifact.content_type)],
      artifact.bytes,
    )
      .into_response(),
    Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "Image Not Found").into_response(),
    Err(e) => {
      error!("读取结果图像失败: {}", e);
      (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
  }
}

async fn result_image(
  State(state): State<AppState>,
  Path((folder, filename)): Path<(String, String)>,
) -> Response {
  artifact_response(state.server.serve(&folder, &filename).await)
}
