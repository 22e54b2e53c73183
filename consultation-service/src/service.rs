use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};
use copilot_core::{CopilotError, Patient};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    consultation::ConsultationRunner,
    llm::{CompletionBackend, CopilotClient},
    models::{
        AnalysisResponse, ChatRequest, ChatResponse, PatientSummary, SessionSnapshot,
        TriageResponse, UpdateNotesRequest,
    },
    registry::PatientRegistry,
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "patient_id": id
        })),
    )
}

fn conflict_error(message: &str) -> ApiError {
    (StatusCode::CONFLICT, Json(json!({ "error": message })))
}

fn map_copilot_error(err: CopilotError) -> ApiError {
    match &err {
        CopilotError::NotesTooShort | CopilotError::EmptyMessage => {
            bad_request_error(&err.to_string())
        }
        CopilotError::FlowBusy(_) => conflict_error(&err.to_string()),
        CopilotError::PatientNotFound(id) => not_found_error("Patient not found", id),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PatientRegistry>,
    pub runner: Arc<ConsultationRunner>,
}

pub fn create_app(backend: Arc<dyn CompletionBackend>) -> Router {
    let state = AppState {
        registry: Arc::new(PatientRegistry::seeded()),
        runner: Arc::new(ConsultationRunner::new(CopilotClient::new(backend))),
    };
    build_router(state)
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/patients", get(list_patients))
        .route("/patients/{id}", get(get_patient))
        .route("/consultations/{patient_id}", get(get_session))
        .route("/consultations/{patient_id}/notes", put(update_notes))
        .route("/consultations/{patient_id}/analysis", post(run_analysis))
        .route("/consultations/{patient_id}/chat", post(run_chat))
        .route("/consultations/{patient_id}/triage", post(run_triage))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "MediCore Consultation Copilot",
        "version": "1.0.0",
        "description": "AI-assisted case analysis, copilot chat and structured triage",
        "endpoints": {
            "GET /patients": "Dashboard patient list",
            "GET /patients/{id}": "Full patient record",
            "GET /consultations/{patient_id}": "Consultation session snapshot",
            "PUT /consultations/{patient_id}/notes": "Update consultation notes",
            "POST /consultations/{patient_id}/analysis": "Run deep case analysis",
            "POST /consultations/{patient_id}/chat": "Send one copilot chat message",
            "POST /consultations/{patient_id}/triage": "Generate structured triage recommendation",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn find_patient(state: &AppState, id: &str) -> Result<Patient, ApiError> {
    state
        .registry
        .get(id)
        .cloned()
        .ok_or_else(|| not_found_error("Patient not found", id))
}

async fn list_patients(State(state): State<AppState>) -> Json<Vec<PatientSummary>> {
    Json(state.registry.all().iter().map(PatientSummary::from).collect())
}

async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Patient> {
    find_patient(&state, &id).map(Json)
}

async fn get_session(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let patient = find_patient(&state, &patient_id)?;
    Ok(Json(state.runner.snapshot(&patient).await))
}

async fn update_notes(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdateNotesRequest>,
) -> ApiResult<SessionSnapshot> {
    let patient = find_patient(&state, &patient_id)?;
    state.runner.set_notes(&patient.id, request.notes).await;
    Ok(Json(state.runner.snapshot(&patient).await))
}

async fn run_analysis(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<AnalysisResponse> {
    let patient = find_patient(&state, &patient_id)?;
    info!(patient_id = %patient.id, "analysis requested");

    let analysis = state
        .runner
        .run_analysis(&patient)
        .await
        .map_err(map_copilot_error)?;
    Ok(Json(AnalysisResponse { analysis }))
}

async fn run_chat(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let patient = find_patient(&state, &patient_id)?;
    info!(patient_id = %patient.id, "chat turn requested");

    let reply = state
        .runner
        .run_chat(&patient, request.message)
        .await
        .map_err(map_copilot_error)?;
    let transcript_len = state.runner.snapshot(&patient).await.transcript.len();
    Ok(Json(ChatResponse {
        reply,
        transcript_len,
    }))
}

async fn run_triage(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<TriageResponse> {
    let patient = find_patient(&state, &patient_id)?;
    info!(patient_id = %patient.id, "triage requested");

    let recommendation = state
        .runner
        .run_triage(&patient)
        .await
        .map_err(map_copilot_error)?;
    Ok(Json(TriageResponse { recommendation }))
}
