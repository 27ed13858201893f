//! 평가 결과 레코드 (JSON 저장/로드)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::metrics::MetricOutcome;

/// 레코드 타임스탬프 형식 (로컬 시각, 마이크로초, 오프셋 없음)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// PASS / FAIL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvalStatus {
    Pass,
    Fail,
}

impl EvalStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            EvalStatus::Pass
        } else {
            EvalStatus::Fail
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvalStatus::Pass => "PASS",
            EvalStatus::Fail => "FAIL",
        }
    }
}

/// 메트릭 1회 측정 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub metric: String,
    pub score: f64,
    pub reason: String,
    pub status: EvalStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl EvalRecord {
    pub fn from_outcome(metric: &str, outcome: &MetricOutcome) -> Self {
        Self {
            metric: metric.to_string(),
            score: outcome.score,
            reason: outcome.reason.clone(),
            status: EvalStatus::from_success(outcome.success),
            timestamp: now_timestamp(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == EvalStatus::Pass
    }
}

/// 현재 로컬 시각
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// 레코드 목록을 JSON 배열로 저장 (4칸 들여쓰기)
pub fn save_records(path: &Path, records: &[EvalRecord]) -> Result<()> {
    write_pretty_json(path, &records)
}

/// JSON 배열 로드
pub fn load_records(path: &Path) -> Result<Vec<EvalRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results file: {}", path.display()))
}

/// 임의 값을 4칸 들여쓰기 JSON으로 저장 (상위 디렉토리 생성)
pub fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize JSON")?;

    fs::write(path, buf).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}
