// 该文件是 Kanjian （看见） 项目的一部分。
// src/stats.rs - 按类别统计检测结果
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

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::Detection;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStatistic {
  pub count: usize,
  /// 平均置信度百分比，保留一位小数
  pub avg_confidence_pct: f64,
}

impl ClassStatistic {
  /// 形如 `87.3%`
  pub fn avg_confidence_display(&self) -> String {
    format!("{:.1}%", self.avg_confidence_pct)
  }
}

/// 类别名称到统计值的映射，只包含实际出现过的类别
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassStatistics(BTreeMap<String, ClassStatistic>);

impl ClassStatistics {
  pub fn get(&self, label: &str) -> Option<&ClassStatistic> {
    self.0.get(label)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassStatistic)> {
    self.0.iter().map(|(label, stat)| (label.as_str(), stat))
  }
}

impl fmt::Display for ClassStatistics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (label, stat) in self.iter() {
      if !first {
        write!(f, ", ")?;
      }
      first = false;
      write!(f, "{} x{} ({})", label, stat.count, stat.avg_confidence_display())?;
    }
    Ok(())
  }
}

/// 按标签（区分大小写）分组，计算数量与平均置信度
pub fn aggregate(detections: &[Detection]) -> ClassStatistics {
  let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
  for det in detections {
    groups
      .entry(det.label.clone())
      .or_default()
      .push(det.confidence as f64);
  }

  let stats = groups
    .into_iter()
    .map(|(label, mut confidences)| {
      // 排序后求和，结果与输入顺序无关
      confidences.sort_by(f64::total_cmp);
      let count = confidences.len();
      let mean = confidences.iter().sum::<f64>() / count as f64;
      let avg_confidence_pct = one_decimal(mean * 100.0);
      (
        label,
        ClassStatistic {
          count,
          avg_confidence_pct,
        },
      )
    })
    .collect();

  ClassStatistics(stats)
}

/// 按 `{:.1}` 的十进制舍入保留一位小数，恰好在中点时取偶数
fn one_decimal(pct: f64) -> f64 {
  format!("{:.1}", pct).parse().unwrap_or(pct)
}
