//! RAG 프롬프트 템플릿
//!
//! `{context}` / `{question}` 자리표시자를 한 번의 패스로 치환합니다.
//! 삽입된 텍스트 안의 중괄호는 다시 해석되지 않습니다.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::knowledge::SearchResult;

/// 컨텍스트에 답이 없을 때 요구하는 고정 응답
pub const ABSTAIN_ANSWER: &str = "I don't know based on available information.";

// ============================================================================
// PromptTemplate
// ============================================================================

/// 이름이 붙은 프롬프트 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: Cow<'static, str>,
    pub template: Cow<'static, str>,
}

impl PromptTemplate {
    pub const fn new_static(name: &'static str, template: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            template: Cow::Borrowed(template),
        }
    }

    /// 사용자 정의 템플릿
    pub fn custom(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            template: Cow::Owned(template.into()),
        }
    }

    /// 자리표시자 치환
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest: &str = &self.template;

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

// ============================================================================
// Presets
// ============================================================================

/// 기본 RAG 프롬프트
pub const DEFAULT: PromptTemplate = PromptTemplate::new_static(
    "DEFAULT",
    "
ONLY answer using the context below.
If not in context, say: \"I don't know based on available information.\"

Context: {context}
Question: {question}
",
);

pub const NO_GUARDRAIL: PromptTemplate = PromptTemplate::new_static(
    "NO_GUARDRAIL",
    "You are a helpful assistant.

Context: {context}

Question: {question}
",
);

pub const WEAK_GUARDRAIL: PromptTemplate = PromptTemplate::new_static(
    "WEAK_GUARDRAIL",
    "You are a helpful assistant.
Try to answer using the context provided.

Context: {context}

Question: {question}
",
);

pub const STRONG_GUARDRAIL: PromptTemplate = PromptTemplate::new_static(
    "STRONG_GUARDRAIL",
    "You are a helpful assistant.
ONLY answer using the context below.
If the answer is not in the context, say: \"I don't know based on available information.\"
Never make up information.

Context: {context}

Question: {question}
",
);

/// 가드레일 강도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailLevel {
    None,
    Weak,
    Strong,
}

impl GuardrailLevel {
    pub const ALL: [GuardrailLevel; 3] =
        [GuardrailLevel::None, GuardrailLevel::Weak, GuardrailLevel::Strong];

    pub fn template(self) -> PromptTemplate {
        match self {
            GuardrailLevel::None => NO_GUARDRAIL,
            GuardrailLevel::Weak => WEAK_GUARDRAIL,
            GuardrailLevel::Strong => STRONG_GUARDRAIL,
        }
    }
}

/// 검색된 청크 텍스트를 빈 줄로 연결
pub fn format_context(chunks: &[SearchResult]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk_text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
