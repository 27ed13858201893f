//! 평가 테스트 케이스

use serde::{Deserialize, Serialize};

/// LLM 평가 단위 (입력 · 실제 출력 · 기대 출력 · 검색 컨텍스트)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmTestCase {
    pub input: String,
    pub actual_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retrieval_context: Vec<String>,
}

impl LlmTestCase {
    pub fn new(input: impl Into<String>, actual_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            actual_output: actual_output.into(),
            ..Default::default()
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retrieval_context = context.into_iter().map(Into::into).collect();
        self
    }

    /// 파라미터 값 조회 (없으면 None)
    pub fn param(&self, param: TestCaseParam) -> Option<String> {
        match param {
            TestCaseParam::Input => Some(self.input.clone()),
            TestCaseParam::ActualOutput => Some(self.actual_output.clone()),
            TestCaseParam::ExpectedOutput => self.expected_output.clone(),
            TestCaseParam::RetrievalContext => {
                if self.retrieval_context.is_empty() {
                    None
                } else {
                    Some(self.retrieval_context.join("\n\n"))
                }
            }
        }
    }
}

/// GEval 평가에 포함할 테스트 케이스 필드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseParam {
    Input,
    ActualOutput,
    ExpectedOutput,
    RetrievalContext,
}

impl TestCaseParam {
    pub fn label(self) -> &'static str {
        match self {
            TestCaseParam::Input => "Input",
            TestCaseParam::ActualOutput => "Actual Output",
            TestCaseParam::ExpectedOutput => "Expected Output",
            TestCaseParam::RetrievalContext => "Retrieval Context",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params() {
        let case = LlmTestCase::new("What is the refund window?", "90 days.")
            .with_expected("30 days only.");

        assert_eq!(
            case.param(TestCaseParam::ExpectedOutput).as_deref(),
            Some("30 days only.")
        );
        assert!(case.param(TestCaseParam::RetrievalContext).is_none());

        let case = case.with_context(["a", "b"]);
        assert_eq!(
            case.param(TestCaseParam::RetrievalContext).as_deref(),
            Some("a\n\nb")
        );
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let json = serde_json::to_value(LlmTestCase::new("q", "a")).unwrap();
        assert!(json.get("expected_output").is_none());
        assert!(json.get("retrieval_context").is_none());
    }
}
