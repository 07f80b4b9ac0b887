//! Intent classification: completion service first, keyword heuristics when
//! that fails, then the same post-processing either way.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::heuristics::{classify_keywords, is_quick_confirm};
use super::timeparse::parse_window;
use crate::models::{ConversationMessage, Intent, NluResult};
use crate::services::ai::{LlmProvider, Message};

const SYSTEM_PROMPT: &str = r#"Bạn là bộ trích xuất intent/slot cho trợ lý đặt lịch spa.
Phân loại: greeting, suggest_relax, list_spas, spa_intro, list_services, service_detail, booking, appointment_lookup, appointment_list_all, skincare_qa, fallback.
- Nếu user xin gợi ý thư giãn/relax/xả stress → suggest_relax.
- Nếu câu có ý đặt lịch hoặc nói mốc thời gian (ví dụ "chiều nay", "sáng mai", "16:00") → booking.
- Nếu có từ ngữ xác nhận trực tiếp như "đặt giúp/đặt luôn/book luôn/xác nhận" → is_confirm=true.
- Xem lịch hẹn theo mốc thời gian → appointment_lookup; xem mọi lịch hẹn → appointment_list_all.

Chỉ trả về JSON (không markdown, không giải thích) đúng cấu trúc:
{
  "intent": "<một intent ở trên>",
  "spa_name_raw": "tên spa như user viết hoặc null",
  "service_name_raw": "tên dịch vụ như user viết hoặc null",
  "city_raw": "thành phố như user viết hoặc null",
  "datetime_raw": "cụm thời gian như user viết hoặc null",
  "time_range": {"start_iso": null, "end_iso": null, "label": null} hoặc null,
  "is_confirm": false,
  "lang": "vi|en|auto",
  "confidence": 0.0
}"#;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("completion service failed: {0}")]
    Provider(anyhow::Error),

    #[error("malformed classification response: {0}")]
    Malformed(String),

    #[error("invalid classification: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> Result<NluResult, ClassifyError>;
}

/// Asks the completion service for a JSON classification.
pub struct LlmClassifier<'a> {
    llm: &'a dyn LlmProvider,
}

impl<'a> LlmClassifier<'a> {
    pub fn new(llm: &'a dyn LlmProvider) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier<'_> {
    async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
    ) -> Result<NluResult, ClassifyError> {
        let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
        messages.push(Message::user(message));

        let response = self
            .llm
            .chat(SYSTEM_PROMPT, &messages)
            .await
            .map_err(ClassifyError::Provider)?;

        parse_nlu_response(&response)
    }
}

pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify_message(&self, message: &str) -> NluResult {
        classify_keywords(message)
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        message: &str,
        _history: &[ConversationMessage],
    ) -> Result<NluResult, ClassifyError> {
        Ok(self.classify_message(message))
    }
}

/// A primary classifier backed by the keyword heuristics. Never fails.
pub struct HybridClassifier<'a> {
    primary: &'a dyn IntentClassifier,
    fallback: KeywordClassifier,
}

impl<'a> HybridClassifier<'a> {
    pub fn new(primary: &'a dyn IntentClassifier) -> Self {
        Self {
            primary,
            fallback: KeywordClassifier,
        }
    }

    pub async fn classify(
        &self,
        message: &str,
        history: &[ConversationMessage],
        now: NaiveDateTime,
    ) -> NluResult {
        let nlu = match self.primary.classify(message, history).await {
            Ok(nlu) => nlu,
            Err(e) => {
                tracing::warn!(error = %e, "classifier failed, using keyword fallback");
                self.fallback.classify_message(message)
            }
        };
        post_process(nlu, message, now)
    }
}

/// Rules applied whichever path classified the message: a fuzzy time window
/// turns an uncommitted or booking intent into a booking carrying that
/// window, and a quick-confirm phrase always sets `is_confirm`.
pub fn post_process(mut nlu: NluResult, message: &str, now: NaiveDateTime) -> NluResult {
    if nlu.intent.is_uncommitted() || nlu.intent == Intent::Booking {
        if let Some(window) = parse_window(message, now) {
            nlu.intent = Intent::Booking;
            nlu.time_range = Some(window);
        }
    }
    if is_quick_confirm(message) {
        nlu.is_confirm = true;
    }
    nlu
}

/// Lenient JSON extraction: raw, fenced in markdown, or the outermost
/// `{...}` span. Anything else is malformed.
pub fn parse_nlu_response(response: &str) -> Result<NluResult, ClassifyError> {
    let trimmed = response.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    let span = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&unfenced[start..=end]),
        _ => None,
    };

    let mut last_err = None;
    for candidate in [Some(trimmed), Some(unfenced), span].into_iter().flatten() {
        match serde_json::from_str::<NluResult>(candidate) {
            Ok(nlu) => return validate(nlu),
            Err(e) => last_err = Some(e),
        }
    }

    Err(ClassifyError::Malformed(
        last_err.map(|e| e.to_string()).unwrap_or_else(|| "empty response".to_string()),
    ))
}

fn validate(nlu: NluResult) -> Result<NluResult, ClassifyError> {
    if !nlu.confidence.is_finite() || !(0.0..=1.0).contains(&nlu.confidence) {
        return Err(ClassifyError::Invalid(format!(
            "confidence {} outside [0, 1]",
            nlu.confidence
        )));
    }
    Ok(nlu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        async fn chat(&self, _system: &str, _messages: &[Message]) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    struct CannedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for CannedLlm {
        async fn chat(&self, _system: &str, _messages: &[Message]) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"intent":"booking","service_name_raw":"massage đá nóng","is_confirm":false,"lang":"vi","confidence":0.9}"#;
        let nlu = parse_nlu_response(json).unwrap();
        assert_eq!(nlu.intent, Intent::Booking);
        assert_eq!(nlu.service_name_raw.as_deref(), Some("massage đá nóng"));
    }

    #[test]
    fn test_parse_fenced_and_wrapped_json() {
        let fenced = "```json\n{\"intent\":\"greeting\",\"is_confirm\":false,\"confidence\":0.8}\n```";
        assert_eq!(parse_nlu_response(fenced).unwrap().intent, Intent::Greeting);

        let chatty = "Kết quả: {\"intent\":\"appt_lookup\",\"is_confirm\":false,\"confidence\":0.7} xong.";
        assert_eq!(parse_nlu_response(chatty).unwrap().intent, Intent::AppointmentLookup);
    }

    #[test]
    fn test_parse_rejects_garbage_and_unknown_intent() {
        assert!(matches!(parse_nlu_response("xin lỗi"), Err(ClassifyError::Malformed(_))));
        assert!(matches!(
            parse_nlu_response(r#"{"intent":"dance","confidence":0.5}"#),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range_confidence() {
        let json = r#"{"intent":"booking","confidence":1.7}"#;
        assert!(matches!(parse_nlu_response(json), Err(ClassifyError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_keywords() {
        let llm = FailingLlm;
        let primary = LlmClassifier::new(&llm);
        let hybrid = HybridClassifier::new(&primary);
        let nlu = hybrid.classify("xin chào", &[], now()).await;
        assert_eq!(nlu.intent, Intent::Greeting);
        assert_eq!(nlu.confidence, 0.4);
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back_like_failure() {
        let llm = CannedLlm("I cannot help with that");
        let primary = LlmClassifier::new(&llm);
        let hybrid = HybridClassifier::new(&primary);
        let nlu = hybrid.classify("lịch hẹn ngày mai", &[], now()).await;
        assert_eq!(nlu.intent, Intent::AppointmentLookup);
    }

    #[tokio::test]
    async fn test_time_window_forces_booking() {
        let llm = CannedLlm(r#"{"intent":"skincare_qa","is_confirm":false,"confidence":0.6}"#);
        let primary = LlmClassifier::new(&llm);
        let hybrid = HybridClassifier::new(&primary);
        let nlu = hybrid.classify("đặt massage đá nóng chiều nay", &[], now()).await;
        assert_eq!(nlu.intent, Intent::Booking);
        let window = nlu.time_range.unwrap();
        assert_eq!(window.label.as_deref(), Some("this_afternoon"));
    }

    #[tokio::test]
    async fn test_time_window_does_not_override_committed_intent() {
        let llm = CannedLlm(r#"{"intent":"appointment_lookup","is_confirm":false,"confidence":0.9}"#);
        let primary = LlmClassifier::new(&llm);
        let hybrid = HybridClassifier::new(&primary);
        let nlu = hybrid.classify("lịch hẹn chiều nay", &[], now()).await;
        assert_eq!(nlu.intent, Intent::AppointmentLookup);
        assert!(nlu.time_range.is_none());
    }

    #[tokio::test]
    async fn test_quick_confirm_sets_flag_regardless_of_intent() {
        let llm = CannedLlm(r#"{"intent":"fallback","is_confirm":false,"confidence":0.2}"#);
        let primary = LlmClassifier::new(&llm);
        let hybrid = HybridClassifier::new(&primary);
        let nlu = hybrid.classify("đặt luôn", &[], now()).await;
        assert!(nlu.is_confirm);
        assert_eq!(nlu.intent, Intent::Fallback);
    }

    #[tokio::test]
    async fn test_keyword_classifier_never_fails() {
        let nlu = KeywordClassifier.classify("", &[]).await.unwrap();
        assert_eq!(nlu.intent, Intent::Fallback);

        let hybrid = HybridClassifier::new(&KeywordClassifier);
        let nlu = hybrid.classify("16:00", &[], now()).await;
        assert_eq!(nlu.intent, Intent::Booking);
    }
}
