//! 라이브 레드팀 벤치마크
//!
//! 공격 프롬프트마다 봇 응답을 받고 judge로 Toxicity를 측정합니다.
//! 무료 티어 분당 한도를 넘지 않도록 공격 사이에 대기합니다.

use std::sync::Arc;

use crate::config::Pacing;
use crate::eval::{EvalRecord, LlmTestCase, Metric};
use crate::llm::LanguageModel;

use super::attacks::Attack;

/// 로그에 남길 응답 미리보기 길이
const PREVIEW_CHARS: usize = 50;

/// 레드팀 벤치마크 실행기
pub struct RedTeamBench {
    bot: Arc<dyn LanguageModel>,
    metric: Arc<dyn Metric>,
    pacing: Pacing,
}

impl RedTeamBench {
    /// # Arguments
    /// * `bot` - 공격 대상 모델
    /// * `metric` - judge 메트릭 (보통 `ToxicityMetric`)
    /// * `pacing` - 대기 시간 설정
    pub fn new(bot: Arc<dyn LanguageModel>, metric: Arc<dyn Metric>, pacing: Pacing) -> Self {
        Self { bot, metric, pacing }
    }

    /// 전체 공격 실행 (실패한 공격은 건너뜀)
    pub async fn run(&self, attacks: &[Attack]) -> Vec<EvalRecord> {
        let mut records = Vec::new();

        for (i, attack) in attacks.iter().enumerate() {
            if let Some(record) = self.run_attack(attack).await {
                println!(
                    "[OK] {} 점수: {:.2} ({})",
                    record.metric,
                    record.score,
                    record.status.as_str()
                );
                records.push(record);
            }

            if i + 1 < attacks.len() {
                tracing::info!(
                    "Waiting {}s to refresh minute limit",
                    self.pacing.attack_interval_secs
                );
                tokio::time::sleep(self.pacing.attack_interval()).await;
            }
        }

        tracing::info!(
            "Red team benchmark finished: {}/{} attacks recorded",
            records.len(),
            attacks.len()
        );
        records
    }

    /// 공격 1건: 봇 응답 → 테스트 케이스 → 메트릭
    pub async fn run_attack(&self, attack: &Attack) -> Option<EvalRecord> {
        let response = self.ask_bot(&attack.example_prompt).await?;

        let preview: String = response.chars().take(PREVIEW_CHARS).collect();
        println!(
            "[*] 카테고리: {} | 봇 응답: {}...",
            attack.attack_category, preview
        );

        let case = LlmTestCase::new(&attack.example_prompt, &response);
        match self.metric.measure(&case).await {
            Ok(outcome) => Some(
                EvalRecord::from_outcome(self.metric.name(), &outcome)
                    .with_category(&attack.attack_category),
            ),
            Err(e) => {
                tracing::warn!("Metric error on '{}': {}", attack.attack_category, e);
                None
            }
        }
    }

    /// 봇 호출 (쿼터 초과 시 대기 후 재시도)
    async fn ask_bot(&self, prompt: &str) -> Option<String> {
        let mut waits = 0u32;

        loop {
            match self.bot.generate(prompt).await {
                Ok(text) => return Some(text),
                Err(e) if e.is_rate_limit() && waits < self.pacing.max_quota_waits => {
                    waits += 1;
                    tracing::warn!(
                        "Quota hit ({}), sleeping {}s [{}/{}]",
                        e,
                        self.pacing.quota_backoff_secs,
                        waits,
                        self.pacing.max_quota_waits
                    );
                    tokio::time::sleep(self.pacing.quota_backoff()).await;
                }
                Err(e) => {
                    tracing::error!("Bot call failed, skipping attack: {}", e);
                    return None;
                }
            }
        }
    }
}
