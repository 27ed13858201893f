//! 프롬프트 가드레일 실험 - 같은 인덱스에 프롬프트만 바꿔 질문

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::eval::checks::is_abstention;
use crate::rag::{GuardrailLevel, RagPipeline};

use super::{preview, ratio};

/// 질문 1건 판정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgedAnswer {
    pub question: String,
    pub answer: String,
    /// 답변 가능 질문: 답했는지 / 답변 불가 질문: 기권했는지
    pub ok: bool,
}

/// 가드레일 수준 1개에 대한 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRun {
    pub level: GuardrailLevel,
    pub answerable: Vec<JudgedAnswer>,
    pub unanswerable: Vec<JudgedAnswer>,
}

impl PromptRun {
    pub fn answered(&self) -> usize {
        self.answerable.iter().filter(|a| a.ok).count()
    }

    pub fn abstained(&self) -> usize {
        self.unanswerable.iter().filter(|a| a.ok).count()
    }

    /// 답변 불가 질문 중 지어낸 비율
    pub fn hallucination_rate(&self) -> f64 {
        ratio(self.unanswerable.len() - self.abstained(), self.unanswerable.len())
    }
}

/// 가드레일 수준별로 답변 가능/불가 질문을 던짐
pub async fn run_prompt_experiment<A: AsRef<str>, U: AsRef<str>>(
    base: &RagPipeline,
    levels: &[GuardrailLevel],
    answerable: &[A],
    unanswerable: &[U],
) -> Result<Vec<PromptRun>> {
    let mut runs = Vec::with_capacity(levels.len());

    for &level in levels {
        let pipeline = base.share_with_prompt(level.template());

        println!("\n{}", "=".repeat(70));
        println!("[*] 실험: {}", pipeline.prompt().name);
        println!("{}", "=".repeat(70));

        println!("\n--- 답변 가능 질문 (답해야 함) ---");
        let mut answered = Vec::with_capacity(answerable.len());
        for question in answerable {
            let question = question.as_ref();
            let answer = pipeline.invoke(question).await?;
            println!("\nQ: {}\nA: {}...", question, preview(&answer, 120));
            answered.push(JudgedAnswer {
                question: question.to_string(),
                ok: !is_abstention(&answer),
                answer,
            });
        }

        println!("\n--- 답변 불가 질문 (기권해야 함) ---");
        let mut abstained = Vec::with_capacity(unanswerable.len());
        for question in unanswerable {
            let question = question.as_ref();
            let answer = pipeline.invoke(question).await?;
            let ok = is_abstention(&answer);
            println!("\nQ: {}\nA: {}...", question, preview(&answer, 120));
            if ok {
                println!("[OK] 기권");
            } else {
                println!("[!] 환각");
            }
            abstained.push(JudgedAnswer {
                question: question.to_string(),
                answer,
                ok,
            });
        }

        let run = PromptRun {
            level,
            answerable: answered,
            unanswerable: abstained,
        };
        tracing::info!(
            "{:?}: answered {}/{}, abstained {}/{}",
            level,
            run.answered(),
            run.answerable.len(),
            run.abstained(),
            run.unanswerable.len()
        );
        runs.push(run);
    }

    Ok(runs)
}
