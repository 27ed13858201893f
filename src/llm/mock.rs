//! 테스트용 모델/임베딩 (네트워크 없음)

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;

use super::{LanguageModel, LlmError};

/// 항상 같은 응답
pub struct StaticModel {
    response: String,
}

impl StaticModel {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for StaticModel {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "static"
    }
}

/// 프롬프트를 그대로 돌려줌 (프롬프트 조립 검증용)
pub struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(prompt.to_string())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// 순서대로 응답/에러를 반환하고 받은 프롬프트를 기록
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<S: AsRef<str>>(replies: &[S]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.as_ref().to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// 질문 키워드에 따라 응답하는 모델 (`(키워드, 응답)` 목록, 마지막은 기본값)
pub struct KeywordModel {
    rules: Vec<(String, String)>,
    fallback: String,
}

impl KeywordModel {
    pub fn new(rules: &[(&str, &str)], fallback: &str) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            fallback: fallback.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for KeywordModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        // 프롬프트 끝의 질문 부분만 비교 (컨텍스트 텍스트 무시)
        let question = prompt
            .rsplit("Question:")
            .next()
            .unwrap_or(prompt)
            .to_lowercase();

        Ok(self
            .rules
            .iter()
            .find(|(k, _)| question.contains(k.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// 결정적 bag-of-words 임베딩 (단어 해시 → 버킷)
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        } else {
            vector[0] = 1.0;
        }

        Ok(vector)
    }

    fn name(&self) -> &str {
        "hash"
    }
}
