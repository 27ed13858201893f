//! 설정 모듈
//!
//! 기본값 → TOML 설정 파일 → 환경변수 순서로 덮어씁니다.
//! CLI 플래그는 각 명령어에서 마지막으로 적용됩니다.
//!
//! 설정 파일 위치 (우선순위):
//! 1. `--config <path>`
//! 2. `PALANK_EVAL_CONFIG` 환경변수
//! 3. `<data_dir>/config.toml` (존재할 때만)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::knowledge::DistanceMetric;

/// 설정 파일 경로 환경변수
pub const CONFIG_ENV: &str = "PALANK_EVAL_CONFIG";
/// 데이터 디렉토리 환경변수
pub const DATA_DIR_ENV: &str = "PALANK_EVAL_DATA_DIR";
/// Ollama 호스트 환경변수 (ollama CLI와 동일)
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.palank-eval/)
///
/// `PALANK_EVAL_DATA_DIR`이 설정되어 있으면 그 경로를 사용합니다.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".palank-eval")
}

// ============================================================================
// Settings
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub gemini: GeminiSettings,
    pub ollama: OllamaSettings,
    pub rag: RagSettings,
    pub pacing: Pacing,
    pub eval: EvalSettings,
}

/// Gemini API 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// 키 로테이션 풀을 구성하는 환경변수 이름 목록
    pub key_vars: Vec<String>,
    /// 평가(judge)·봇 응답용 모델
    pub model: String,
    /// ISO 시나리오 생성용 모델
    pub generation_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// 무료 티어 분당 요청 수
    pub requests_per_minute: u32,
    /// 호출 간 최소 딜레이
    pub min_delay_ms: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            key_vars: vec!["GEMINI_KEY_A".to_string(), "GEMINI_KEY_B".to_string()],
            model: "gemini-2.5-flash".to_string(),
            generation_model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            requests_per_minute: 10,
            min_delay_ms: 1000,
        }
    }
}

/// Ollama 로컬 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embed_model: "llama3.2".to_string(),
            timeout_secs: 300,
        }
    }
}

/// RAG 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub docs_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub collection: String,
    pub metric: DistanceMetric,
    /// LanceDB 디렉토리 (None이면 데이터 디렉토리 아래 vectors.lance)
    pub persist_dir: Option<PathBuf>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("sampledocs"),
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            collection: "rag_fresh".to_string(),
            metric: DistanceMetric::Cosine,
            persist_dir: None,
        }
    }
}

impl RagSettings {
    /// LanceDB 저장 경로
    pub fn persist_path(&self) -> PathBuf {
        self.persist_dir
            .clone()
            .unwrap_or_else(|| get_data_dir().join("vectors.lance"))
    }
}

/// 무료 티어 rate limit 회피용 대기 시간
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// 키 로테이션 직후 대기
    pub key_rotation_cooldown_secs: u64,
    /// 시나리오 생성 간 대기
    pub scenario_cooldown_secs: u64,
    /// 일/분 쿼터 초과 시 대기
    pub quota_backoff_secs: u64,
    /// 레드팀 공격 간 대기 (분당 한도 리셋)
    pub attack_interval_secs: u64,
    /// 메트릭 간 대기
    pub metric_interval_secs: u64,
    /// 쿼터 초과 시 최대 재시도 횟수
    pub max_quota_waits: u32,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            key_rotation_cooldown_secs: 10,
            scenario_cooldown_secs: 20,
            quota_backoff_secs: 60,
            attack_interval_secs: 65,
            metric_interval_secs: 15,
            max_quota_waits: 5,
        }
    }
}

impl Pacing {
    /// 모든 대기를 0으로 (테스트, `--no-wait`)
    pub fn immediate() -> Self {
        Self {
            key_rotation_cooldown_secs: 0,
            scenario_cooldown_secs: 0,
            quota_backoff_secs: 0,
            attack_interval_secs: 0,
            metric_interval_secs: 0,
            ..Self::default()
        }
    }

    pub fn key_rotation_cooldown(&self) -> Duration {
        Duration::from_secs(self.key_rotation_cooldown_secs)
    }

    pub fn scenario_cooldown(&self) -> Duration {
        Duration::from_secs(self.scenario_cooldown_secs)
    }

    pub fn quota_backoff(&self) -> Duration {
        Duration::from_secs(self.quota_backoff_secs)
    }

    pub fn attack_interval(&self) -> Duration {
        Duration::from_secs(self.attack_interval_secs)
    }

    pub fn metric_interval(&self) -> Duration {
        Duration::from_secs(self.metric_interval_secs)
    }
}

/// 평가 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalSettings {
    /// 메트릭 통과 기준
    pub threshold: f64,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// 설정 로드
    ///
    /// # Arguments
    /// * `explicit` - `--config`로 지정한 경로 (지정 시 파일이 반드시 존재해야 함)
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match Self::resolve_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        settings.apply_env();
        Ok(settings)
    }

    /// TOML 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(settings)
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let default_path = get_data_dir().join("config.toml");
        default_path.exists().then_some(default_path)
    }

    /// 환경변수 덮어쓰기
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var(OLLAMA_HOST_ENV) {
            if !host.is_empty() {
                self.ollama.base_url = normalize_ollama_host(&host);
            }
        }
    }
}

/// OLLAMA_HOST 값 정규화 (`127.0.0.1:11434` 형태 허용)
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.gemini.key_vars, vec!["GEMINI_KEY_A", "GEMINI_KEY_B"]);
        assert_eq!(settings.rag.chunk_size, 500);
        assert_eq!(settings.rag.chunk_overlap, 50);
        assert_eq!(settings.rag.top_k, 3);
        assert_eq!(settings.rag.metric, DistanceMetric::Cosine);
        assert_eq!(settings.pacing.attack_interval_secs, 65);
        assert!((settings.eval.threshold - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[rag]
chunk_size = 1000
metric = "l2"

[pacing]
attack_interval_secs = 5
"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.rag.chunk_size, 1000);
        assert_eq!(settings.rag.metric, DistanceMetric::L2);
        assert_eq!(settings.rag.chunk_overlap, 50);
        assert_eq!(settings.pacing.attack_interval_secs, 5);
        assert_eq!(settings.pacing.quota_backoff_secs, 60);
        assert_eq!(settings.ollama.model, "llama3.2");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/palank-eval.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_ollama_host() {
        assert_eq!(normalize_ollama_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(
            normalize_ollama_host("http://gpu-box:11434/"),
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn test_immediate_pacing() {
        let pacing = Pacing::immediate();
        assert!(pacing.attack_interval().is_zero());
        assert!(pacing.key_rotation_cooldown().is_zero());
        assert_eq!(pacing.max_quota_waits, Pacing::default().max_quota_waits);
    }
}
