use serde::Serialize;
use serde_json::Value;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{AppError, Result};
use crate::quiz::QuizQuestion;

pub const DEFAULT_NUMBER_OF_QUESTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub url: String,
    pub number_of_questions: u32,
}

impl QuizRequest {
    /// Validates a raw JSON body. A missing or empty `url` is reported before
    /// anything else in the body is looked at.
    pub fn from_body(body: &Value) -> Result<Self> {
        let url = match body.get("url") {
            None | Some(Value::Null) => return Err(AppError::MissingUrl),
            Some(Value::String(s)) if s.trim().is_empty() => return Err(AppError::MissingUrl),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => return Err(AppError::InvalidRequest("url must be a string".into())),
        };

        let parsed = Url::parse(&url).map_err(|_| AppError::InvalidUrl(url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::InvalidUrl(url));
        }

        let number_of_questions = match body.get("numberOfQuestions") {
            None | Some(Value::Null) => DEFAULT_NUMBER_OF_QUESTIONS,
            Some(v) => v
                .as_u64()
                .or_else(|| whole_number(v))
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    AppError::InvalidRequest("numberOfQuestions must be a positive integer".into())
                })?,
        };

        Ok(Self {
            url,
            number_of_questions,
        })
    }
}

/// `5.0` as sent by JavaScript clients.
fn whole_number(v: &Value) -> Option<u64> {
    let f = v.as_f64()?;
    if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    pub success: bool,
    pub blog_title: String,
    pub quiz: Vec<QuizQuestion>,
    pub metadata: QuizMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMetadata {
    pub url: String,
    pub number_of_questions: u32,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_url_wins_over_other_problems() {
        for body in [
            json!({}),
            json!({ "numberOfQuestions": 3 }),
            json!({ "numberOfQuestions": "lots" }),
            json!({ "url": null, "numberOfQuestions": -2 }),
            json!({ "url": "   " }),
        ] {
            assert!(matches!(QuizRequest::from_body(&body), Err(AppError::MissingUrl)), "{}", body);
        }
    }

    #[test]
    fn count_defaults_to_five() {
        let req = QuizRequest::from_body(&json!({ "url": "https://blog.example/post" })).unwrap();
        assert_eq!(req.number_of_questions, 5);
        assert_eq!(req.url, "https://blog.example/post");

        let req = QuizRequest::from_body(&json!({ "url": "https://blog.example/post", "numberOfQuestions": 8 }))
            .unwrap();
        assert_eq!(req.number_of_questions, 8);

        let req = QuizRequest::from_body(&json!({ "url": "https://blog.example/post", "numberOfQuestions": 5.0 }))
            .unwrap();
        assert_eq!(req.number_of_questions, 5);
    }

    #[test]
    fn rejects_bad_counts_and_urls() {
        for count in [json!(0), json!(-1), json!(2.5), json!(0.0), json!(-3.0), json!(1e12), json!("3")] {
            let body = json!({ "url": "https://blog.example/post", "numberOfQuestions": count });
            assert!(matches!(QuizRequest::from_body(&body), Err(AppError::InvalidRequest(_))));
        }
        for url in ["not a url", "/relative/path", "ftp://files.example/x", "mailto:a@b.c"] {
            assert!(matches!(
                QuizRequest::from_body(&json!({ "url": url })),
                Err(AppError::InvalidUrl(_))
            ));
        }
        assert!(matches!(
            QuizRequest::from_body(&json!({ "url": 42 })),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
