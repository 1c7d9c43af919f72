use crate::occurrence::{OccurrenceContext, OccurrenceKind};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::time::Duration;

/// Everything the generation collaborator sees for one occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub kind: OccurrenceKind,
    pub context: OccurrenceContext,
    /// Detector-supplied literal replacement; when present the collaborator
    /// may return it unchanged without consulting anything else.
    pub hint: Option<String>,
}

/// Recoverable failure of the generation collaborator. The affected
/// occurrence becomes unresolved; processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No term could be derived from the available context.
    NoTerm,
    TimedOut,
    Failed(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::NoTerm => write!(f, "no fill term derivable from context"),
            GenerationError::TimedOut => write!(f, "generation timed out"),
            GenerationError::Failed(detail) => write!(f, "generation failed: {detail}"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// The external text-generation capability. Implementations produce the
/// replacement text for one occurrence from its context.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>>;
}

/// Run one generation call under a deadline. A timeout is reported as an
/// ordinary recoverable failure.
pub async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
    deadline: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(deadline, generator.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::TimedOut),
    }
}

static TRAILING_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z0-9 ]{0,23}|[\p{Han}]{1,8})\s*[:：]\s*$").expect("static pattern")
});
static LEADING_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([\p{Han}]{2,8}|[A-Za-z][A-Za-z0-9]{1,23})").expect("static pattern"));

/// Deterministic generator implementing the field-inheritance rules:
/// inherit the field name before a trailing colon (`姓名：____` fills as
/// `{{姓名}}`), else fall back to the field named right after the blank.
/// Produced terms are wrapped in double braces unless `wrap` is off.
pub struct FieldNameGenerator {
    pub wrap: bool,
}

impl Default for FieldNameGenerator {
    fn default() -> Self {
        Self { wrap: true }
    }
}

impl FieldNameGenerator {
    fn derive_term(&self, context: &OccurrenceContext) -> Option<String> {
        if let Some(captures) = TRAILING_FIELD.captures(&context.before) {
            return Some(captures[1].trim().to_string());
        }
        if let Some(captures) = LEADING_FIELD.captures(&context.after) {
            return Some(captures[1].to_string());
        }
        None
    }
}

impl TextGenerator for FieldNameGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            if let Some(hint) = &request.hint {
                return Ok(hint.clone());
            }
            match self.derive_term(&request.context) {
                Some(term) if self.wrap => Ok(format!("{{{{{term}}}}}")),
                Some(term) => Ok(term),
                None => Err(GenerationError::NoTerm),
            }
        })
    }
}

/// Generator returning the same text for every request. Useful in tests and
/// for bulk redaction runs.
pub struct FixedGenerator {
    pub text: String,
}

impl FixedGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextGenerator for FixedGenerator {
    fn generate<'a>(
        &'a self,
        _request: &'a GenerationRequest,
    ) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move { Ok(self.text.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(before: &str, after: &str) -> GenerationRequest {
        GenerationRequest {
            kind: OccurrenceKind::CharacterRun,
            context: OccurrenceContext {
                before: before.to_string(),
                after: after.to_string(),
                line: format!("{before}____{after}"),
            },
            hint: None,
        }
    }

    #[tokio::test]
    async fn test_inherits_field_before_colon() {
        let generator = FieldNameGenerator::default();
        let result = generator.generate(&request("Name: ", ", Age:")).await;
        assert_eq!(result.unwrap(), "{{Name}}");
    }

    #[tokio::test]
    async fn test_inherits_fullwidth_colon_field() {
        let generator = FieldNameGenerator::default();
        let result = generator.generate(&request("申请人姓名：", "，特此证明")).await;
        assert_eq!(result.unwrap(), "{{申请人姓名}}");
    }

    #[tokio::test]
    async fn test_falls_back_to_following_field() {
        let generator = FieldNameGenerator::default();
        let result = generator.generate(&request("请填写", "专业申请表")).await;
        assert_eq!(result.unwrap(), "{{专业申请表}}");
    }

    #[tokio::test]
    async fn test_no_term_is_recoverable_error() {
        let generator = FieldNameGenerator::default();
        let result = generator.generate(&request("!!! ", " ...")).await;
        assert_eq!(result.unwrap_err(), GenerationError::NoTerm);
    }

    #[tokio::test]
    async fn test_hint_passes_through_unwrapped() {
        let generator = FieldNameGenerator::default();
        let mut req = request("", "");
        req.hint = Some("年龄".to_string());
        assert_eq!(generator.generate(&req).await.unwrap(), "年龄");
    }

    #[tokio::test]
    async fn test_unwrapped_output() {
        let generator = FieldNameGenerator { wrap: false };
        let result = generator.generate(&request("Date: ", "")).await;
        assert_eq!(result.unwrap(), "Date");
    }

    #[tokio::test]
    async fn test_timeout_becomes_recoverable_error() {
        struct SlowGenerator;
        impl TextGenerator for SlowGenerator {
            fn generate<'a>(
                &'a self,
                _request: &'a GenerationRequest,
            ) -> BoxFuture<'a, Result<String, GenerationError>> {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                })
            }
        }

        let result = generate_with_timeout(
            &SlowGenerator,
            &request("Name: ", ""),
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result.unwrap_err(), GenerationError::TimedOut);
    }
}
