// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/ultralytics.rs - Ultralytics YOLO 命令行检测器
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
use std::process::Command;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::Local;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{ClassNames, Detection, DetectionRun, Detector, DetectorError},
};

/// 置信度阈值，属于服务策略，不接受请求参数覆盖
pub const CONFIDENCE_THRESHOLD: f32 = 0.25;
/// NMS IoU 阈值，同样是固定策略
pub const IOU_THRESHOLD: f32 = 0.4;
/// 默认预训练权重，使用 COCO 类别
const DEFAULT_MODEL: &str = "yolov8n.pt";

const DEFAULT_PROGRAM: &str = "yolo";
const SAVE_DIR_MARKER: &str = "Results saved to ";

/// 由 `yolo:<权重文件>?bin=<可执行文件>&names=<类别文件>` 形式的地址构建。
///
/// 默认权重之外的模型必须提供 `names`，否则类别名称无法与编号对应。
pub struct UltralyticsBuilder {
  weights: String,
  program: String,
  names: ClassNames,
  results_root: PathBuf,
}

impl FromUrlWithScheme for UltralyticsBuilder {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for UltralyticsBuilder {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::InvalidUrl(format!(
        "期望检测器方案 '{}', 实际方案 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let weights = urlencoding::decode(url.path())
      .map_err(|e| DetectorError::InvalidUrl(e.to_string()))?
      .into_owned();
    if weights.is_empty() {
      return Err(DetectorError::InvalidUrl("缺少模型权重文件".to_string()));
    }

    let program = url
      .query_pairs()
      .find(|(k, _)| k == "bin")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

    let names_file = url
      .query_pairs()
      .find(|(k, _)| k == "names")
      .map(|(_, v)| PathBuf::from(v.into_owned()));
    let names = match names_file {
      Some(path) => ClassNames::from_file(&path)?,
      None if weights == DEFAULT_MODEL => ClassNames::coco(),
      None => {
        return Err(DetectorError::InvalidUrl(format!(
          "自定义权重 {} 必须通过 names=<类别文件> 提供类别名称",
          weights
        )));
      }
    };

    Ok(UltralyticsBuilder {
      weights,
      program,
      names,
      results_root: PathBuf::from("runs/detect"),
    })
  }
}

impl UltralyticsBuilder {
  pub fn results_root(mut self, results_root: impl Into<PathBuf>) -> Self {
    self.results_root = results_root.into();
    self
  }

  pub fn build(self) -> UltralyticsDetector {
    info!(
      "检测器: {} model={} conf={} iou={} 类别数={}",
      self.program,
      self.weights,
      CONFIDENCE_THRESHOLD,
      IOU_THRESHOLD,
      self.names.len()
    );
    UltralyticsDetector {
      weights: self.weights,
      program: self.program,
      names: self.names,
      results_root: self.results_root,
      run_counter: AtomicU16::new(0),
    }
  }
}

/// 通过 `yolo predict` 子进程完成检测，检测器自行保存标注图像
pub struct UltralyticsDetector {
  weights: String,
  program: String,
  names: ClassNames,
  results_root: PathBuf,
  run_counter: AtomicU16,
}

impl UltralyticsDetector {
  fn run_name(&self) -> String {
    let id = self.run_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    format!("predict-{}-{:04X}", Local::now().format("%Y%m%d-%H%M%S"), id)
  }

  fn command_args(&self, source: &Path, run_name: &str) -> Vec<String> {
    vec![
      "predict".to_string(),
      format!("model={}", self.weights),
      format!("source={}", source.display()),
      format!("conf={}", CONFIDENCE_THRESHOLD),
      format!("iou={}", IOU_THRESHOLD),
      "save=True".to_string(),
      "save_txt=True".to_string(),
      "save_conf=True".to_string(),
      format!("project={}", self.results_root.display()),
      format!("name={}", run_name),
      "exist_ok=True".to_string(),
    ]
  }
}

impl Detector for UltralyticsDetector {
  fn detect(&self, image_path: &Path) -> Result<DetectionRun, DetectorError> {
    let run_name = self.run_name();
    let args = self.command_args(image_path, &run_name);
    debug!("执行检测器: {} {}", self.program, args.join(" "));

    let now = std::time::Instant::now();
    let output = Command::new(&self.program)
      .args(&args)
      .output()
      .map_err(|source| {
        error!("无法执行检测器 {}: {}", self.program, source);
        DetectorError::Spawn {
          program: self.program.clone(),
          source,
        }
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
      error!("检测器错误: {}", stderr);
      return Err(DetectorError::Failed {
        status: output.status,
        stderr: stderr.into_owned(),
      });
    }
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let requested = self.results_root.join(&run_name);
    let output_dir = parse_save_dir(&stdout)
      .or_else(|| parse_save_dir(&stderr))
      .or_else(|| requested.is_dir().then(|| requested.clone()));
    if output_dir.is_none() {
      warn!("检测器没有报告输出目录: {}", requested.display());
    }

    let labels_dir = output_dir.as_deref().unwrap_or(&requested).join("labels");
    let label_file = image_path
      .file_stem()
      .and_then(|stem| find_label_file(&labels_dir, &stem.to_string_lossy()));
    let detections = match label_file {
      Some(path) => parse_labels(&std::fs::read_to_string(&path)?, &self.names)?,
      None => {
        debug!("没有标签文件: {}", labels_dir.display());
        Vec::new()
      }
    };
    info!("检测到 {} 个对象", detections.len());

    Ok(DetectionRun {
      detections,
      output_dir,
    })
  }
}

fn strip_ansi(text: &str) -> String {
  let mut plain = String::with_capacity(text.len());
  let mut chars = text.chars();
  while let Some(c) = chars.next() {
    if c == '\u{1b}' {
      // CSI 序列以字母结尾
      for c in chars.by_ref() {
        if c.is_ascii_alphabetic() {
          break;
        }
      }
    } else {
      plain.push(c);
    }
  }
  plain
}

/// 从检测器日志中找出 `Results saved to <dir>`
fn parse_save_dir(log: &str) -> Option<PathBuf> {
  strip_ansi(log).lines().rev().find_map(|line| {
    let (_, rest) = line.split_once(SAVE_DIR_MARKER)?;
    let dir = rest.trim();
    (!dir.is_empty()).then(|| PathBuf::from(dir))
  })
}

/// 标签文件每行为 `class x_center y_center width height confidence`
fn parse_labels(content: &str, names: &ClassNames) -> Result<Vec<Detection>, DetectorError> {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(|line| {
      let fields: Vec<&str> = line.split_whitespace().collect();
      let &[class, x, y, w, h, conf] = fields.as_slice() else {
        return Err(DetectorError::Malformed(format!("字段数量错误: '{}'", line)));
      };
      let number = |s: &str| {
        s.parse::<f32>()
          .map_err(|e| DetectorError::Malformed(format!("'{}': {}", s, e)))
      };
      let class_id = class
        .parse::<usize>()
        .map_err(|e| DetectorError::Malformed(format!("类别编号 '{}': {}", class, e)))?;

      Ok(Detection {
        label: names.name(class_id).to_string(),
        class_id,
        confidence: number(conf)?,
        x_center: number(x)?,
        y_center: number(y)?,
        width: number(w)?,
        height: number(h)?,
      })
    })
    .collect()
}

/// 查找图像对应的标签文件。
///
/// 静态图像写入 `<stem>.txt`；gif 按视频处理，每帧写入 `<stem>_<帧号>.txt`，
/// 此时取帧号最小的一帧。没有检测到目标时检测器不会写标签文件。
fn find_label_file(labels_dir: &Path, stem: &str) -> Option<PathBuf> {
  let still = labels_dir.join(format!("{}.txt", stem));
  if still.is_file() {
    return Some(still);
  }

  let prefix = format!("{}_", stem);
  std::fs::read_dir(labels_dir)
    .ok()?
    .filter_map(Result::ok)
    .filter_map(|entry| {
      let name = entry.file_name().into_string().ok()?;
      let frame = name
        .strip_prefix(&prefix)?
        .strip_suffix(".txt")?
        .parse::<u64>()
        .ok()?;
      Some((frame, entry.path()))
    })
    .min_by_key(|(frame, _)| *frame)
    .map(|(_, path)| path)
}
