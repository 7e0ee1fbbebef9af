use axum::{
    routing::{get, post},
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{json, Value};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use chrono::Utc;
use std::time::Instant;

use crate::error::{Result, AppError};
use crate::api::models::{HealthResponse, QuizMetadata, QuizRequest, QuizResponse};
use crate::api::response;
use crate::AppState;

/// Minimum number of extracted characters worth sending to the model.
pub const MIN_CONTENT_CHARS: usize = 100;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/generate-quiz", post(generate_quiz_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn generate_quiz_handler(
    State(state): State<AppState>,
    payload: Bytes,
) -> Result<impl IntoResponse> {
    let body = parse_body(&payload)?;
    let req = QuizRequest::from_body(&body)?;

    let start_time = Instant::now();
    let quiz = process_quiz_request(&state, &req).await?;
    tracing::info!(url = %req.url, elapsed = ?start_time.elapsed(), "quiz generated");

    Ok(response::success(quiz))
}

/// An empty body reads as `null` so it reports a missing url. The content
/// type is not checked.
fn parse_body(payload: &[u8]) -> Result<Value> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(payload)
        .map_err(|_| AppError::InvalidRequest("request body is not valid JSON".to_string()))
}

async fn process_quiz_request(state: &AppState, req: &QuizRequest) -> Result<QuizResponse> {
    tracing::info!(url = %req.url, "fetching content");
    let page = state.extractor.extract(&req.url).await?;

    let chars = page.content.chars().count();
    if chars < MIN_CONTENT_CHARS {
        tracing::warn!(url = %req.url, chars, "extracted content too short");
        return Err(AppError::InsufficientContent);
    }

    tracing::info!(
        url = %req.url,
        chars,
        number_of_questions = req.number_of_questions,
        "generating quiz"
    );
    let quiz = state.generator.generate(&page, req.number_of_questions).await?;

    Ok(QuizResponse {
        success: true,
        blog_title: page.title,
        quiz: quiz.questions,
        metadata: QuizMetadata {
            url: req.url.clone(),
            number_of_questions: req.number_of_questions,
            generated_at: Utc::now(),
        },
    })
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthResponse {
        status: "ok".to_string(),
        message: "Ollama Quiz API is running".to_string(),
    })
}

async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    response::success(json!({
        "message": "Ollama Quiz Generator API",
        "model": state.config.ollama_model,
        "endpoints": {
            "POST /generate-quiz": {
                "description": "Generate a quiz from a blog post URL",
                "body": {
                    "url": "required - URL of the blog post",
                    "numberOfQuestions": "optional - Number of quiz questions (default: 5)"
                }
            },
            "GET /health": "Check API health status"
        }
    }))
}

async fn not_found() -> impl IntoResponse {
    response::error(StatusCode::NOT_FOUND, "Not found", "No route matches this request")
}
