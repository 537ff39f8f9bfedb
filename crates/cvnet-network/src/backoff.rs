//! 재연결 지수 백오프.
//!
//! 연결 실패마다 시도 카운터가 증가하고, 다음 연결 전에
//! `min(base * 2^(attempt-1), max)` 만큼 대기한다. 검증된 연결 성공 시 0으로 초기화.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

pub struct Backoff {
    attempt: AtomicU32,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            attempt: AtomicU32::new(0),
            base,
            max,
        }
    }

    /// 연속 실패 횟수
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// 실패 기록: 갱신된 카운터 반환
    pub fn record_failure(&self) -> u32 {
        self.attempt.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub fn reset(&self) {
        self.attempt.store(0, Ordering::SeqCst);
    }

    /// 다음 연결 전 대기 시간
    pub fn current_delay(&self) -> Duration {
        let attempt = self.attempt();
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub async fn wait(&self) {
        let delay = self.current_delay();
        if delay.is_zero() {
            return;
        }
        debug!("재연결 백오프 {}ms (시도 {})", delay.as_millis(), self.attempt());
        tokio::time::sleep(delay).await;
    }
}
