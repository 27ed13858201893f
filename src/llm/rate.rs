//! Rate Limiter - 호출 간 최소 딜레이 + 분당 요청 수 제한
//!
//! Gemini 무료 티어는 분당 요청 수가 매우 작으므로 요청 전에
//! 반드시 `acquire()`로 순서를 기다립니다.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 기본 윈도우 (1분)
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// 슬라이딩 윈도우 + 최소 간격 제한기
#[derive(Debug)]
pub struct RateLimiter {
    /// 윈도우 안의 요청 시각 (오래된 순)
    sent: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
    min_delay: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, min_delay: Duration) -> Self {
        Self {
            sent: VecDeque::new(),
            max_requests: max_requests.max(1) as usize,
            window,
            min_delay,
        }
    }

    /// 분당 요청 수 기준으로 생성
    pub fn per_minute(rpm: u32, min_delay: Duration) -> Self {
        Self::new(rpm, DEFAULT_WINDOW, min_delay)
    }

    /// `now` 시점에 요청하려면 기다려야 하는 시간
    ///
    /// 최소 간격과 윈도우 한도 중 더 긴 쪽을 따릅니다.
    fn wait_at(&mut self, now: Instant) -> Duration {
        while let Some(&oldest) = self.sent.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        let gap = self
            .sent
            .back()
            .map(|&last| self.min_delay.saturating_sub(now.saturating_duration_since(last)))
            .unwrap_or(Duration::ZERO);

        let quota = if self.sent.len() >= self.max_requests {
            // 윈도우를 비워야 하는 요청 수만큼 앞에서 센 시각이 만료될 때까지
            let idx = self.sent.len() - self.max_requests;
            self.sent
                .get(idx)
                .map(|&t| self.window.saturating_sub(now.saturating_duration_since(t)))
                .unwrap_or(Duration::ZERO)
        } else {
            Duration::ZERO
        };

        gap.max(quota)
    }

    /// 요청 가능할 때까지 대기 후 요청 기록
    pub async fn acquire(&mut self) {
        let wait = self.wait_at(Instant::now());
        if !wait.is_zero() {
            if self.sent.len() >= self.max_requests {
                tracing::info!("Rate limit reached, waiting {:?}", wait);
            } else {
                tracing::debug!("Min delay: waiting {:?}", wait);
            }
            tokio::time::sleep(wait).await;
        }
        self.sent.push_back(Instant::now());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_min_delay_after_last_request() {
        let mut limiter = RateLimiter::new(100, DEFAULT_WINDOW, Duration::from_millis(500));
        let t0 = Instant::now();
        assert_eq!(limiter.wait_at(t0), Duration::ZERO);

        limiter.sent.push_back(t0);
        assert_eq!(
            limiter.wait_at(t0 + Duration::from_millis(200)),
            Duration::from_millis(300)
        );
        assert_eq!(limiter.wait_at(t0 + Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn test_wait_for_oldest_to_leave_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60), Duration::ZERO);
        let t0 = Instant::now();
        limiter.sent.push_back(t0);
        limiter.sent.push_back(t0 + Duration::from_secs(10));

        assert_eq!(
            limiter.wait_at(t0 + Duration::from_secs(20)),
            Duration::from_secs(40)
        );
        // 윈도우를 벗어난 요청은 제거
        assert_eq!(limiter.wait_at(t0 + Duration::from_secs(61)), Duration::ZERO);
        assert_eq!(limiter.sent.len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_sleeps_and_records() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(50), Duration::from_millis(10));

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert_eq!(limiter.sent.len(), 2);

        // 세 번째 요청은 첫 요청이 윈도우를 벗어날 때까지 대기
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_zero_rpm_is_clamped() {
        let limiter = RateLimiter::per_minute(0, Duration::ZERO);
        assert_eq!(limiter.max_requests, 1);
    }
}
