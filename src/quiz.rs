use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::extractor::PageContent;
use crate::llm::{BackendError, ChatBackend, ChatRequest, Message, SamplingOptions};

pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl QuizQuestion {
    fn validate(&self, index: usize) -> std::result::Result<(), String> {
        let position = index + 1;
        if self.question.trim().is_empty() {
            return Err(format!("question {} has no text", position));
        }
        if self.options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "question {} has {} options, expected {}",
                position,
                self.options.len(),
                OPTIONS_PER_QUESTION
            ));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(format!("question {} has an empty option", position));
        }
        if self.correct_answer >= OPTIONS_PER_QUESTION {
            return Err(format!(
                "question {} has correctAnswer {} out of range",
                position, self.correct_answer
            ));
        }
        if self.explanation.trim().is_empty() {
            return Err(format!("question {} has no explanation", position));
        }
        Ok(())
    }
}

pub fn build_prompt(page: &PageContent, number_of_questions: u32) -> String {
    let mut result = String::with_capacity(page.content.len() + page.title.len() + 1024);
    result.push_str(&format!(
        "Based on the following blog post content, generate {} multiple-choice quiz questions \
         that test understanding of the key concepts.\n\n",
        number_of_questions
    ));
    result.push_str("Blog Title: ");
    result.push_str(&page.title);
    result.push_str("\nBlog Content: ");
    result.push_str(&page.content);
    result.push_str(
        r#"

Please generate the quiz in JSON format with the following structure:
{
  "questions": [
    {
      "question": "Question text here",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correctAnswer": 0,
      "explanation": "Brief explanation of why this is the correct answer"
    }
  ]
}

Make sure the questions are:
- Relevant to the main topics covered in the blog post
- Clear and unambiguous
- Testing comprehension, not just memory
- Varied in difficulty
- Have exactly 4 options each
"#,
    );
    result.push_str(&format!(
        "\nGenerate exactly {} questions. Return ONLY the JSON, no additional text.",
        number_of_questions
    ));
    result
}

/// Why model output was not accepted as a quiz.
///
/// `Display` never includes model text; serde errors quote the values they
/// reject, so they are only reachable through `source()` and `Debug`.
#[derive(Debug, Error)]
pub enum QuizParseError {
    #[error("not valid JSON")]
    Syntax(#[source] serde_json::Error),

    #[error("unexpected quiz shape")]
    Shape(#[source] serde_json::Error),

    #[error("quiz contains no questions")]
    Empty,

    #[error("{0}")]
    Invalid(String),
}

/// Turns raw model output into a validated quiz.
///
/// Accepts either an object with a `questions` array or a bare array of
/// questions.
pub fn parse_quiz(raw: &str) -> std::result::Result<Quiz, QuizParseError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(QuizParseError::Syntax)?;

    let questions = match value {
        Value::Object(mut map) if map.contains_key("questions") => map.remove("questions").unwrap_or(Value::Null),
        other => other,
    };

    let questions: Vec<QuizQuestion> = serde_json::from_value(questions).map_err(QuizParseError::Shape)?;
    if questions.is_empty() {
        return Err(QuizParseError::Empty);
    }
    for (i, q) in questions.iter().enumerate() {
        q.validate(i).map_err(QuizParseError::Invalid)?;
    }

    Ok(Quiz { questions })
}

/// Builds prompts, calls the chat backend and validates what comes back.
pub struct QuizGenerator {
    backend: Arc<dyn ChatBackend>,
    model: String,
    options: SamplingOptions,
}

impl QuizGenerator {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            options: SamplingOptions::default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, page: &PageContent, number_of_questions: u32) -> Result<Quiz> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(build_prompt(page, number_of_questions))],
            format: Some("json".to_string()),
            stream: false,
            options: self.options.clone(),
        };

        tracing::info!(model = %self.model, number_of_questions, "requesting quiz from model");
        let start = Instant::now();
        let raw = self.backend.chat(request).await.map_err(|e| self.map_backend_error(e))?;
        tracing::info!(elapsed = ?start.elapsed(), "model responded");

        parse_quiz(&raw).map_err(|err| {
            tracing::error!(error = ?err, raw = %raw, "failed to parse model response");
            AppError::InvalidResponse(err.to_string())
        })
    }

    fn map_backend_error(&self, err: BackendError) -> AppError {
        match err {
            BackendError::Unavailable(detail) => {
                tracing::error!(%detail, "model backend unreachable");
                AppError::ModelUnavailable(self.backend.endpoint().to_string())
            }
            BackendError::ModelNotFound(_) => AppError::ModelNotFound(self.model.clone()),
            BackendError::Timeout(secs) => AppError::Timeout("Model request", secs),
            BackendError::Decode(detail) => {
                tracing::error!(%detail, "failed to decode model backend response");
                AppError::InvalidResponse("response envelope could not be decoded".to_string())
            }
            other @ BackendError::Api { .. } => AppError::LlmError(other.to_string()),
            BackendError::Client(detail) => AppError::ConfigError(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ONE_QUESTION: &str = r#"{"questions":[{"question":"Q1","options":["A","B","C","D"],"correctAnswer":2,"explanation":"because"}]}"#;

    struct ScriptedBackend {
        reply: Mutex<Option<std::result::Result<String, BackendError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(reply: std::result::Result<String, BackendError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, request: ChatRequest) -> std::result::Result<String, BackendError> {
            self.seen.lock().unwrap().push(request);
            self.reply.lock().unwrap().take().expect("backend called twice")
        }

        fn endpoint(&self) -> &str {
            "http://ollama.test:11434"
        }
    }

    fn page() -> PageContent {
        PageContent {
            title: "Borrowing".into(),
            content: "References let you use a value without taking ownership of it.".into(),
        }
    }

    #[test]
    fn prompt_carries_count_title_content_and_schema() {
        let prompt = build_prompt(&page(), 7);
        assert!(prompt.contains("generate 7 multiple-choice"));
        assert!(prompt.contains("Generate exactly 7 questions"));
        assert!(prompt.contains("Blog Title: Borrowing"));
        assert!(prompt.contains("Blog Content: References let you use"));
        assert!(prompt.contains("\"correctAnswer\": 0"));
        assert!(prompt.contains("Return ONLY the JSON"));
    }

    #[test]
    fn parses_wrapped_and_bare_question_lists() {
        let quiz = parse_quiz(ONE_QUESTION).unwrap();
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].correct_answer, 2);

        let bare = r#"[{"question":"Q","options":["a","b","c","d"],"correctAnswer":0,"explanation":"e"}]"#;
        assert_eq!(parse_quiz(bare).unwrap().questions[0].question, "Q");
    }

    #[test]
    fn rejects_malformed_output() {
        let cases = [
            "not json",
            r#"{"questions":[]}"#,
            r#"{"questions":[{"question":"Q","options":["a","b","c"],"correctAnswer":0,"explanation":"e"}]}"#,
            r#"{"questions":[{"question":"Q","options":["a","b","c","d"],"correctAnswer":4,"explanation":"e"}]}"#,
            r#"{"questions":[{"question":"Q","options":["a","b","c","d"],"correctAnswer":-1,"explanation":"e"}]}"#,
            r#"{"questions":[{"question":" ","options":["a","b","c","d"],"correctAnswer":1,"explanation":"e"}]}"#,
            r#"{"questions":[{"question":"Q","options":["a","","c","d"],"correctAnswer":1,"explanation":"e"}]}"#,
            r#"{"questions":[{"question":"Q","options":["a","b","c","d"],"correctAnswer":1}]}"#,
            r#"{"quiz":"nope"}"#,
        ];
        for raw in cases {
            assert!(parse_quiz(raw).is_err(), "accepted: {}", raw);
        }
    }

    #[test]
    fn parse_errors_do_not_echo_raw_text() {
        let cases = [
            "secret model ramblings",
            r#""secret model ramblings""#,
            r#"{"questions":"secret model ramblings"}"#,
            r#"{"questions":[{"question":"Q","options":"secret model ramblings","correctAnswer":0,"explanation":"e"}]}"#,
        ];
        for raw in cases {
            let err = parse_quiz(raw).unwrap_err();
            assert!(!err.to_string().contains("ramblings"), "{} -> {}", raw, err);
        }
        assert!(matches!(parse_quiz(r#""not json""#), Err(QuizParseError::Shape(_))));
        assert!(matches!(parse_quiz("not json"), Err(QuizParseError::Syntax(_))));
    }

    #[tokio::test]
    async fn generate_sends_json_mode_request() {
        let backend = ScriptedBackend::new(Ok(ONE_QUESTION.to_string()));
        let generator = QuizGenerator::new(backend.clone(), "llama2");

        let quiz = generator.generate(&page(), 3).await.unwrap();
        assert_eq!(quiz.questions[0].explanation, "because");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.model, "llama2");
        assert_eq!(request.format.as_deref(), Some("json"));
        assert!(!request.stream);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert!(request.messages[0].content.contains("generate 3 multiple-choice"));
        assert_eq!(request.options, SamplingOptions::default());
    }

    #[tokio::test]
    async fn backend_failures_map_to_app_errors() {
        let generator = QuizGenerator::new(
            ScriptedBackend::new(Err(BackendError::Unavailable("connection refused".into()))),
            "llama2",
        );
        match generator.generate(&page(), 5).await.unwrap_err() {
            AppError::ModelUnavailable(host) => assert_eq!(host, "http://ollama.test:11434"),
            other => panic!("unexpected error: {:?}", other),
        }

        let generator = QuizGenerator::new(
            ScriptedBackend::new(Err(BackendError::ModelNotFound("whatever".into()))),
            "mistral",
        );
        match generator.generate(&page(), 5).await.unwrap_err() {
            AppError::ModelNotFound(model) => assert_eq!(model, "mistral"),
            other => panic!("unexpected error: {:?}", other),
        }

        let generator = QuizGenerator::new(ScriptedBackend::new(Err(BackendError::Timeout(9))), "llama2");
        assert!(matches!(
            generator.generate(&page(), 5).await.unwrap_err(),
            AppError::Timeout(_, 9)
        ));

        let generator = QuizGenerator::new(
            ScriptedBackend::new(Err(BackendError::Client("no TLS backend".into()))),
            "llama2",
        );
        assert!(matches!(
            generator.generate(&page(), 5).await.unwrap_err(),
            AppError::ConfigError(_)
        ));

        let generator = QuizGenerator::new(ScriptedBackend::new(Ok("not json".into())), "llama2");
        assert!(matches!(
            generator.generate(&page(), 5).await.unwrap_err(),
            AppError::InvalidResponse(_)
        ));
    }
}
