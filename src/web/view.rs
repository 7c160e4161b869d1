// 该文件是 Kanjian （看见） 项目的一部分。
// src/web/view.rs - 页面渲染
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

use std::fmt::Write;

use crate::task::DetectionReport;

const STYLE: &str = "body{font-family:sans-serif;max-width:960px;margin:2em auto}\
.error{color:#b00020}table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 12px}\
img{max-width:100%}";

fn escape_html(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&#39;"),
      _ => escaped.push(c),
    }
  }
  escaped
}

fn page(title: &str, body: &str) -> String {
  format!(
    "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head>\n<body>\n{}</body>\n</html>\n",
    escape_html(title),
    STYLE,
    body
  )
}

/// 上传表单，可带错误提示
pub fn render_index(error: Option<&str>) -> String {
  let mut body = String::from("<h1>Object Detection</h1>\n");
  if let Some(message) = error.filter(|m| !m.is_empty()) {
    let _ = writeln!(body, "<p class=\"error\">{}</p>", escape_html(message));
  }
  body.push_str(
    "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
     <input type=\"file\" name=\"file\" accept=\"image/*\">\n\
     <button type=\"submit\">Detect</button>\n\
     </form>\n",
  );
  page("Object Detection", &body)
}

/// 结果页面：图像、类别统计表，以及供前端绘制边框的原始检测 JSON
pub fn render_result(report: &DetectionReport) -> Result<String, serde_json::Error> {
  let artifact = &report.artifact;
  let detections = serde_json::to_string(&report.detections)?.replace("</", "<\\/");

  let mut body = String::from("<h1>Detection Result</h1>\n");
  let _ = writeln!(
    body,
    "<p>{}</p>\n<img id=\"result\" src=\"/results/{}/{}\" alt=\"{}\">",
    escape_html(&report.upload.original_filename),
    urlencoding::encode(artifact.logical_folder.as_str()),
    urlencoding::encode(&artifact.filename),
    escape_html(&artifact.filename),
  );

  if report.statistics.is_empty() {
    body.push_str("<p>No objects detected.</p>\n");
  } else {
    body.push_str("<table>\n<tr><th>Object</th><th>Count</th><th>Avg. confidence</th></tr>\n");
    for (label, stat) in report.statistics.iter() {
      let _ = writeln!(
        body,
        "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(label),
        stat.count,
        stat.avg_confidence_display()
      );
    }
    body.push_str("</table>\n");
  }

  let _ = writeln!(
    body,
    "<script type=\"application/json\" id=\"detections\">{}</script>",
    detections
  );
  body.push_str("<p><a href=\"/\">Upload another image</a></p>\n");

  Ok(page("Detection Result", &body))
}
