// 该文件是 Kanjian （看见） 项目的一部分。
// tests/http.rs - HTTP 接口测试
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
use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use tower::ServiceExt;

use kanjian::{
  model::{Detection, DetectionRun, Detector, DetectorError},
  serve::ResultServer,
  task::DetectionTask,
  upload::StorageKey,
  web::{AppState, router},
};

const BOUNDARY: &str = "kanjian-boundary";

/// 把上传图像原样复制为标注结果，并报告一只猫
struct CopyDetector {
  results_root: PathBuf,
}

impl Detector for CopyDetector {
  fn detect(&self, image_path: &Path) -> Result<DetectionRun, DetectorError> {
    let output_dir = self.results_root.join("predict");
    std::fs::create_dir_all(&output_dir)?;
    std::fs::copy(image_path, output_dir.join(image_path.file_name().unwrap()))?;
    Ok(DetectionRun {
      detections: vec![Detection {
        label: "cat".to_string(),
        class_id: 15,
        confidence: 0.9,
        x_center: 0.5,
        y_center: 0.5,
        width: 0.2,
        height: 0.2,
      }],
      output_dir: Some(output_dir),
    })
  }
}

fn app(dir: &Path) -> Router {
  let uploads = dir.join("uploads");
  let results = dir.join("runs/detect");
  std::fs::create_dir_all(&uploads).unwrap();
  std::fs::create_dir_all(&results).unwrap();

  let detector = CopyDetector {
    results_root: results.clone(),
  };
  let task = DetectionTask::new(Arc::new(detector), &uploads, StorageKey::Original);
  router(AppState::new(task, ResultServer::new(&uploads, &results)), 1 << 20)
}

/// 构造 multipart 请求，每个字段为 (字段名, 文件名, 内容)
fn upload_request(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
  let mut body = Vec::new();
  for (name, filename, content) in fields {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    let disposition = match filename {
      Some(filename) => format!("form-data; name=\"{name}\"; filename=\"{filename}\""),
      None => format!("form-data; name=\"{name}\""),
    };
    body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

  Request::builder()
    .method("POST")
    .uri("/")
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .unwrap()
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
  response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn form_without_file_field_redirects() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(upload_request(&[("comment", None, b"hello")]))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::SEE_OTHER);
  assert_eq!(location(&response), "/?error=No%20file%20selected%20for%20upload.");
}

#[tokio::test]
async fn file_field_without_name_redirects() {
  let dir = tempfile::tempdir().unwrap();
  let app = app(dir.path());

  for filename in [None, Some("")] {
    let response = app
      .clone()
      .oneshot(upload_request(&[("file", filename, b"")]))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?error=No%20file%20was%20chosen.");
  }
  assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
}

#[tokio::test]
async fn disallowed_extension_redirects() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(upload_request(&[("file", Some("virus.exe"), b"MZ")]))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::SEE_OTHER);
  let target = location(&response);
  assert!(target.starts_with("/?error=Invalid%20file%20type."));
  assert!(target.contains(".EXE%20file."));
}

#[tokio::test]
async fn upload_renders_result_and_serves_image() {
  let dir = tempfile::tempdir().unwrap();
  let app = app(dir.path());

  let response = app
    .clone()
    .oneshot(upload_request(&[
      ("comment", None, b"ignored"),
      ("file", Some("cat.png"), b"png bytes"),
    ]))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  let page = body_text(response).await;
  assert!(page.contains("src=\"/results/predict/cat.png\""));
  assert!(page.contains("<td>cat</td><td>1</td><td>90.0%</td>"));

  let response = app.oneshot(get("/results/predict/cat.png")).await.unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
  assert_eq!(body_text(response).await, "png bytes");
}

#[tokio::test]
async fn missing_result_image_is_404() {
  let dir = tempfile::tempdir().unwrap();
  let app = app(dir.path());

  for uri in ["/results/uploads/ghost.png", "/results/predict/ghost.png"] {
    let response = app.clone().oneshot(get(uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Image Not Found");
  }
}

#[tokio::test]
async fn index_shows_error_message() {
  let dir = tempfile::tempdir().unwrap();
  let response = app(dir.path())
    .oneshot(get("/?error=No%20file%20was%20chosen."))
    .await
    .unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  let page = body_text(response).await;
  assert!(page.contains("<p class=\"error\">No file was chosen.</p>"));
}
