//! API 키 로테이션 풀
//!
//! 무료 티어 계정 여러 개의 키를 환경변수로 받아 순환 사용합니다.
//! rate limit(429)을 만나면 다음 키로 넘어가고, 모든 키를 한 번씩
//! 시도한 뒤에도 실패하면 포기합니다.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::LlmError;

// ============================================================================
// ApiKey
// ============================================================================

/// 환경변수 이름(label)과 키 값
#[derive(Clone)]
pub struct ApiKey {
    /// 환경변수 이름 (로그 출력용)
    pub label: String,
    secret: String,
}

impl ApiKey {
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }

    /// 키 값 (HTTP 헤더 전송용)
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("label", &self.label)
            .field("secret", &"***")
            .finish()
    }
}

// ============================================================================
// KeyPool
// ============================================================================

/// 키 로테이션 풀 (고정 크기 목록 + 순환 인덱스)
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<ApiKey>,
    current: AtomicUsize,
}

impl KeyPool {
    /// 키 목록으로 생성 (빈 값은 제외)
    pub fn new(keys: Vec<ApiKey>) -> Result<Self, LlmError> {
        let keys: Vec<ApiKey> = keys
            .into_iter()
            .filter(|k| !k.secret.trim().is_empty())
            .collect();

        if keys.is_empty() {
            return Err(LlmError::NoKeys("<empty key list>".to_string()));
        }

        Ok(Self {
            keys,
            current: AtomicUsize::new(0),
        })
    }

    /// 환경변수 이름 목록에서 키 로드
    ///
    /// 설정되지 않았거나 비어있는 변수는 건너뜁니다.
    pub fn from_env<S: AsRef<str>>(vars: &[S]) -> Result<Self, LlmError> {
        let keys: Vec<ApiKey> = vars
            .iter()
            .filter_map(|var| {
                let var = var.as_ref();
                std::env::var(var)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| ApiKey::new(var, v))
            })
            .collect();

        if keys.is_empty() {
            let names: Vec<&str> = vars.iter().map(|v| v.as_ref()).collect();
            return Err(LlmError::NoKeys(names.join(", ")));
        }

        tracing::debug!("Loaded {} API key(s) for rotation", keys.len());
        Self::new(keys)
    }

    /// 시작 인덱스 지정 (풀 크기로 나눈 나머지)
    pub fn starting_at(self, index: usize) -> Self {
        let start = index % self.keys.len();
        self.current.store(start, Ordering::SeqCst);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 현재 키 인덱스 (0-based)
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// 현재 키
    pub fn current(&self) -> &ApiKey {
        &self.keys[self.current_index()]
    }

    /// 키 라벨 목록 (상태 출력용)
    pub fn labels(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.label.as_str()).collect()
    }

    /// 다음 키로 전환 (끝에서 처음으로 순환)
    ///
    /// # Returns
    /// 새 키 인덱스
    pub fn rotate(&self) -> usize {
        let len = self.keys.len();
        let next = (self.current.load(Ordering::SeqCst) + 1) % len;
        self.current.store(next, Ordering::SeqCst);
        tracing::info!("Switching to API key {} ({})", next + 1, self.keys[next].label);
        next
    }

    /// 키 로테이션을 적용하여 요청 실행
    ///
    /// 각 키를 최대 한 번씩 시도합니다. rate limit 에러면 다음 키로
    /// 전환하고 `cooldown`만큼 대기 후 재시도합니다. 그 외 에러는 즉시
    /// 반환합니다.
    pub async fn call_with_rotation<T, F, Fut>(
        &self,
        cooldown: Duration,
        mut op: F,
    ) -> Result<T, LlmError>
    where
        F: FnMut(ApiKey) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let attempts = self.keys.len();

        for attempt in 0..attempts {
            let key = self.current().clone();

            match op(key).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limit() => {
                    tracing::warn!(
                        "API key {} exhausted ({}), rotating (attempt {}/{})",
                        self.current_index() + 1,
                        e,
                        attempt + 1,
                        attempts
                    );
                    self.rotate();
                    if !cooldown.is_zero() {
                        tokio::time::sleep(cooldown).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::KeysExhausted { attempts })
    }
}

// ============================================================================
// Tests
// ============================================================================
