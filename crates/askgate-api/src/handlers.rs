use crate::{ApiError, ApiResult, AppState};
use askgate_core::{AskError, MetadataFilter, RiskProfile};
use askgate_rag::{AskRequest, RequestTimings, ValidationReport};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// Wire shape of `POST /ask`. Kept loose so bad values become 400s with a
/// useful message instead of generic deserialization rejections.
#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<i64>,
    #[serde(default)]
    pub risk_profile: Option<String>,
    #[serde(default)]
    pub filters: Option<MetadataFilter>,
}

impl TryFrom<AskBody> for AskRequest {
    type Error = AskError;

    fn try_from(body: AskBody) -> Result<Self, Self::Error> {
        let top_k = match body.top_k {
            Some(k) if k <= 0 => {
                return Err(AskError::invalid_request(format!(
                    "top_k must be positive, got {k}"
                )))
            }
            Some(k) => Some(k as usize),
            None => None,
        };
        let risk_profile = match body.risk_profile.as_deref() {
            Some(raw) => raw.parse::<RiskProfile>()?,
            None => RiskProfile::default(),
        };
        Ok(AskRequest {
            question: body.question,
            top_k,
            risk_profile,
            filters: body.filters.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Uuid>,
    pub validation_report: ValidationReport,
    pub request_id: Uuid,
    pub timings_ms: RequestTimings,
}

pub async fn ask(
    State(state): State<AppState>,
    body: Result<Json<AskBody>, JsonRejection>,
) -> ApiResult<Json<AskResponse>> {
    let Json(body) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = AskRequest::try_from(body)?;
    let request_id = Uuid::new_v4();

    let result = state
        .orchestrator
        .ask(request)
        .instrument(info_span!("ask", %request_id))
        .await?;

    Ok(Json(AskResponse {
        answer: result.answer,
        citations: result.citations,
        validation_report: result.validation_report,
        request_id,
        timings_ms: result.timings,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let stats = state.corpus.stats();
    let queryable = state.corpus.is_queryable();
    let status = if queryable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if queryable { "ready" } else { "not_ready" },
            "documents": stats.documents,
            "chunks": stats.chunks,
            "embedded_chunks": stats.embedded_chunks,
        })),
    )
}
