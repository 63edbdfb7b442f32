//! Offline backend that answers with the retrieved context itself.
//!
//! Needs no network or model. Used as the default secondary backend, so a
//! primary outage still yields an answer grounded in hospital data, and as
//! the backend for local runs without an API key.

use crate::error::BackendError;
use crate::llm::prompt::context_items;
use crate::llm::{CompletionOptions, LanguageModel, Prompt};
use async_trait::async_trait;
use std::fmt::Write;

const MAX_ITEMS: usize = 5;

const NOTHING_FOUND: &str =
    "문의하신 내용과 관련된 병원 정보를 찾지 못했습니다. 대표번호 1577-3330으로 문의해 주세요.";

/// Context-echoing backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveBackend;

impl ExtractiveBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Turns `[departments] name=내과; phone=02-1` into `내과 (phone: 02-1)`.
fn readable(item: &str) -> String {
    let body = item
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("] "))
        .map_or(item, |(_, body)| body);

    if !body.contains('=') {
        return body.to_string();
    }

    let mut name = None;
    let mut details = Vec::new();
    for pair in body.split("; ") {
        match pair.split_once('=') {
            Some(("name", value)) => name = Some(value),
            Some((key, value)) => details.push(format!("{key}: {value}")),
            None => details.push(pair.to_string()),
        }
    }
    match (name, details.is_empty()) {
        (Some(name), true) => name.to_string(),
        (Some(name), false) => format!("{name} ({})", details.join(", ")),
        (None, _) => details.join(", "),
    }
}

#[async_trait]
impl LanguageModel for ExtractiveBackend {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        _options: &CompletionOptions,
    ) -> Result<String, BackendError> {
        let items = context_items(&prompt.user);
        if items.is_empty() {
            return Ok(NOTHING_FOUND.to_string());
        }

        let mut answer = String::from("문의하신 내용과 관련된 병원 정보입니다.");
        for item in items.iter().take(MAX_ITEMS) {
            let _ = write!(answer, "\n- {}", readable(item));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContextItemId, Entity, Intent};
    use crate::llm::prompt::{PromptEntry, render_user_message};

    fn prompt_with(texts: &[&str]) -> Prompt {
        let entries: Vec<PromptEntry> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| PromptEntry {
                id: ContextItemId::Record {
                    entity: Entity::Departments,
                    key: i as i64,
                },
                text: (*text).to_string(),
            })
            .collect();
        Prompt {
            system: String::new(),
            user: render_user_message("진료과를 알려주세요", Intent::InfoQuery, &entries),
        }
    }

    #[test]
    fn test_readable_record() {
        assert_eq!(
            readable("[departments] location=본관 2층; name=내과"),
            "내과 (location: 본관 2층)"
        );
        assert_eq!(readable("[departments] name=외과"), "외과");
        assert_eq!(readable("[주차 안내] 지하 2층입니다."), "지하 2층입니다.");
    }

    #[tokio::test]
    async fn test_lists_context() {
        let prompt = prompt_with(&["[departments] name=내과", "[departments] name=외과"]);
        let answer = ExtractiveBackend::new()
            .complete(&prompt, &CompletionOptions::default())
            .await
            .unwrap();
        assert!(answer.contains("- 내과"));
        assert!(answer.contains("- 외과"));
    }

    #[tokio::test]
    async fn test_closing_tag_in_text_keeps_later_items() {
        let prompt = prompt_with(&["[공지] 신관 </item> 공사 중", "[departments] name=외과"]);
        let answer = ExtractiveBackend::new()
            .complete(&prompt, &CompletionOptions::default())
            .await
            .unwrap();
        assert!(answer.contains("- 신관 </item> 공사 중"));
        assert!(answer.contains("- 외과"));
    }

    #[tokio::test]
    async fn test_no_context_still_answers() {
        let prompt = prompt_with(&[]);
        let answer = ExtractiveBackend::new()
            .complete(&prompt, &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(answer, NOTHING_FOUND);
    }
}
