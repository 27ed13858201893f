//! ISO 20022 pain.001 테스트 시나리오 생성
//!
//! - 단건: 시나리오마다 한 번씩 요청 (요청 사이 쿨다운)
//! - 배치: 한 번의 요청으로 여러 시나리오를 받아 `---SCENARIO: [Name]---` 마커로 분리
//!
//! 생성된 XML은 API 쿼터를 쓰지 않고 로컬에서 well-formed 여부만 검사합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;

use crate::config::Pacing;
use crate::llm::{LanguageModel, LlmError};

// ============================================================================
// Prompts
// ============================================================================

/// 단건 시나리오 프롬프트
pub fn scenario_prompt(attack: &str) -> String {
    format!(
        "Act as a Banking Expert. Generate a 'pain.001' snippet for: {}. Return XML ONLY.",
        attack
    )
}

/// 배치 프롬프트 (파서용 마커 형식 지정)
pub fn batch_prompt<S: AsRef<str>>(scenarios: &[S]) -> String {
    let list = scenarios
        .iter()
        .map(|s| format!("- {}", s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Act as an ISO 20022 Expert. Generate raw XML snippets for 'pain.001' based on:\n\
         {}\n\n\
         Format your response exactly like this for my parser:\n\
         ---SCENARIO: [Name]---\n\
         [XML HERE]\n",
        list
    )
}

// ============================================================================
// Parsing
// ============================================================================

/// 생성된 시나리오 (이름 + XML)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScenario {
    pub name: String,
    pub xml: String,
}

/// 배치 응답을 시나리오별로 분리
///
/// 첫 마커 앞의 텍스트는 무시하고, XML의 코드 펜스는 제거합니다.
pub fn split_scenarios(raw: &str) -> Result<Vec<GeneratedScenario>> {
    let marker = Regex::new(r"---SCENARIO: (.*?)---").context("Invalid scenario marker pattern")?;

    let headers: Vec<(String, usize, usize)> = marker
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().trim().to_string();
            Some((name, whole.start(), whole.end()))
        })
        .collect();

    let scenarios = headers
        .iter()
        .enumerate()
        .map(|(i, (name, _, body_start))| {
            let body_end = headers.get(i + 1).map(|h| h.1).unwrap_or(raw.len());
            GeneratedScenario {
                name: name.clone(),
                xml: strip_code_fence(&raw[*body_start..body_end]),
            }
        })
        .collect();

    Ok(scenarios)
}

/// ```xml ... ``` 펜스 제거 후 trim
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // 여는 펜스의 언어 태그 줄 제거
    let body = match after_open.find('\n') {
        Some(pos) => &after_open[pos + 1..],
        None => after_open,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// 저장 파일 이름: `test_<소문자, 공백→_>.xml`
pub fn scenario_file_name(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    format!("test_{}.xml", slug.to_lowercase())
}

// ============================================================================
// XML Validation
// ============================================================================

/// XML well-formedness 에러
#[derive(Error, Debug, PartialEq, Eq)]
pub enum XmlCheckError {
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Unclosed element: <{0}>")]
    Unclosed(String),

    #[error("No root element")]
    NoRoot,

    #[error("More than one root element")]
    MultipleRoots,

    #[error("Text outside the root element")]
    TextOutsideRoot,
}

/// XML이 well-formed인지 검사 (스키마 검증 아님)
pub fn validate_xml(xml: &str) -> Result<(), XmlCheckError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut roots = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| XmlCheckError::Syntax {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if stack.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        return Err(XmlCheckError::MultipleRoots);
                    }
                }
                stack.push(String::from_utf8_lossy(start.name().as_ref()).to_string());
            }
            Event::Empty(_) => {
                if stack.is_empty() {
                    roots += 1;
                    if roots > 1 {
                        return Err(XmlCheckError::MultipleRoots);
                    }
                }
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
                match stack.pop() {
                    Some(open) if open == name => {}
                    Some(open) => {
                        return Err(XmlCheckError::Syntax {
                            position: reader.buffer_position(),
                            message: format!("expected </{}>, found </{}>", open, name),
                        })
                    }
                    None => {
                        return Err(XmlCheckError::Syntax {
                            position: reader.buffer_position(),
                            message: format!("unexpected </{}>", name),
                        })
                    }
                }
            }
            Event::Text(text) => {
                let blank = text.iter().all(|b| b.is_ascii_whitespace());
                if stack.is_empty() && !blank {
                    return Err(XmlCheckError::TextOutsideRoot);
                }
            }
            Event::CData(_) => {
                if stack.is_empty() {
                    return Err(XmlCheckError::TextOutsideRoot);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlCheckError::Unclosed(open));
    }
    if roots == 0 {
        return Err(XmlCheckError::NoRoot);
    }
    Ok(())
}

// ============================================================================
// Generator
// ============================================================================

/// 시나리오 생성기
pub struct IsoGenerator {
    model: Arc<dyn LanguageModel>,
    pacing: Pacing,
}

impl IsoGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, pacing: Pacing) -> Self {
        Self { model, pacing }
    }

    /// 단건 생성
    pub async fn generate_one(&self, scenario: &str) -> Result<GeneratedScenario, LlmError> {
        let raw = self.model.generate(&scenario_prompt(scenario)).await?;
        Ok(GeneratedScenario {
            name: scenario.to_string(),
            xml: strip_code_fence(&raw),
        })
    }

    /// 시나리오마다 개별 요청 (요청 사이 쿨다운, 실패한 시나리오는 건너뜀)
    pub async fn generate_each<S: AsRef<str>>(&self, scenarios: &[S]) -> Vec<GeneratedScenario> {
        let mut generated = Vec::new();

        for (i, scenario) in scenarios.iter().enumerate() {
            let scenario = scenario.as_ref();
            println!("[*] 생성 중: {}", scenario);

            match self.generate_one(scenario).await {
                Ok(result) => generated.push(result),
                Err(e) => {
                    println!("[!] 생성 실패 ({}): {}", scenario, e);
                    tracing::warn!("Scenario generation failed for '{}': {}", scenario, e);
                }
            }

            if i + 1 < scenarios.len() {
                tracing::info!("Cooldown {}s", self.pacing.scenario_cooldown_secs);
                tokio::time::sleep(self.pacing.scenario_cooldown()).await;
            }
        }

        generated
    }

    /// 한 번의 요청으로 배치 생성
    pub async fn generate_batch<S: AsRef<str>>(
        &self,
        scenarios: &[S],
    ) -> Result<Vec<GeneratedScenario>> {
        let raw = self
            .model
            .generate(&batch_prompt(scenarios))
            .await
            .context("Batch generation failed")?;

        let parsed = split_scenarios(&raw)?;
        if parsed.is_empty() {
            tracing::warn!("Batch response contained no scenario markers");
        }
        Ok(parsed)
    }
}

// ============================================================================
// Saving
// ============================================================================

/// 저장 결과
#[derive(Debug)]
pub struct SavedScenario {
    pub name: String,
    pub path: PathBuf,
    pub validation: Result<(), XmlCheckError>,
}

/// 시나리오를 파일로 저장하고 각 XML 검증 결과 반환
pub fn save_scenarios(dir: &Path, scenarios: &[GeneratedScenario]) -> Result<Vec<SavedScenario>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut saved = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let path = dir.join(scenario_file_name(&scenario.name));
        std::fs::write(&path, &scenario.xml)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        saved.push(SavedScenario {
            name: scenario.name.clone(),
            path,
            validation: validate_xml(&scenario.xml),
        });
    }

    Ok(saved)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedModel;
    use tempfile::TempDir;

    const PAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pain.001.001.09">
  <CstmrCdtTrfInitn>
    <GrpHdr><MsgId>MSG-1</MsgId><NbOfTxs>1</NbOfTxs></GrpHdr>
    <Cdtr><Nm>AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA</Nm></Cdtr>
    <Flag/>
  </CstmrCdtTrfInitn>
</Document>"#;

    #[test]
    fn test_prompts() {
        assert!(scenario_prompt("SQL injection in Remittance").ends_with("Return XML ONLY."));
        let batch = batch_prompt(&["Buffer Overflow in Creditor Name", "Invalid characters in IBAN"]);
        assert!(batch.contains("- Buffer Overflow in Creditor Name\n- Invalid characters in IBAN"));
        assert!(batch.contains("---SCENARIO: [Name]---"));
    }

    #[test]
    fn test_split_scenarios() {
        let raw = "Sure! Here they are.\n\
                   ---SCENARIO: Buffer Overflow in Creditor Name---\n\
                   ```xml\n<Document><A/></Document>\n```\n\
                   ---SCENARIO:  SQL Injection in Remittance Info ---\n\
                   <Document><B>' OR 1=1 --</B></Document>\n";

        let parsed = split_scenarios(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Buffer Overflow in Creditor Name");
        assert_eq!(parsed[0].xml, "<Document><A/></Document>");
        assert_eq!(parsed[1].name, "SQL Injection in Remittance Info");
        assert_eq!(parsed[1].xml, "<Document><B>' OR 1=1 --</B></Document>");
    }

    #[test]
    fn test_split_without_markers() {
        assert!(split_scenarios("<Document/>").unwrap().is_empty());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```xml\n<a/>\n```"), "<a/>");
        assert_eq!(strip_code_fence("```\n<a/>\n```  "), "<a/>");
        assert_eq!(strip_code_fence("  <a/> "), "<a/>");
    }

    #[test]
    fn test_scenario_file_name() {
        assert_eq!(
            scenario_file_name("Buffer Overflow in Creditor Name"),
            "test_buffer_overflow_in_creditor_name.xml"
        );
        assert_eq!(scenario_file_name("../etc/passwd"), "test_.._etc_passwd.xml");
    }

    #[test]
    fn test_validate_well_formed() {
        assert_eq!(validate_xml(PAIN), Ok(()));
        assert_eq!(validate_xml("<Flag/>"), Ok(()));
        assert_eq!(validate_xml("<!-- c --><a>x</a>\n"), Ok(()));
    }

    #[test]
    fn test_validate_errors() {
        assert!(matches!(
            validate_xml("<a><b></a></b>"),
            Err(XmlCheckError::Syntax { .. })
        ));
        assert!(validate_xml("<a><b>").is_err());
        assert_eq!(validate_xml(""), Err(XmlCheckError::NoRoot));
        assert_eq!(validate_xml("<a/><b/>"), Err(XmlCheckError::MultipleRoots));
        assert_eq!(
            validate_xml("Here is your XML: <a/>"),
            Err(XmlCheckError::TextOutsideRoot)
        );
    }

    #[tokio::test]
    async fn test_generate_each_skips_failures() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("```xml\n<Document/>\n```".to_string()),
            Err(LlmError::KeysExhausted { attempts: 2 }),
        ]));
        let generator = IsoGenerator::new(model.clone(), Pacing::immediate());

        let generated = generator
            .generate_each(&["Buffer Overflow in Creditor", "SQL injection in Remittance"])
            .await;
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].xml, "<Document/>");
        assert!(model.prompts()[1].contains("SQL injection in Remittance"));
    }

    #[tokio::test]
    async fn test_batch_generate_and_save() {
        let model = Arc::new(ScriptedModel::replies(&[
            "---SCENARIO: Good One---\n<Document><A/></Document>\n---SCENARIO: Bad One---\n<Document><A></Document>",
        ]));
        let generator = IsoGenerator::new(model, Pacing::immediate());
        let scenarios = generator.generate_batch(&["Good One", "Bad One"]).await.unwrap();

        let dir = TempDir::new().unwrap();
        let saved = save_scenarios(dir.path(), &scenarios).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].validation.is_ok());
        assert!(saved[1].validation.is_err());
        assert!(dir.path().join("test_good_one.xml").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("test_bad_one.xml")).unwrap(),
            "<Document><A></Document>"
        );
    }
}
