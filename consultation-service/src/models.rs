use copilot_core::{
    ChatTurn, HeaderAlerts, Patient, PatientStatus, RequestState, TriageModalState,
    TriageRecommendation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub transcript_len: usize,
}

#[derive(Debug, Serialize)]
pub struct TriageResponse {
    pub recommendation: Option<TriageRecommendation>,
}

/// Dashboard row for the patient list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub status: PatientStatus,
    pub wait_time_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_note: Option<String>,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            name: patient.name.clone(),
            age: patient.age,
            status: patient.status,
            wait_time_minutes: patient.wait_time_minutes,
            triage_note: patient.triage_note.clone(),
        }
    }
}

/// Full consultation-session snapshot: notes, per-flow request states, the
/// transcript, the derived triage modal state and the header alert flags.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub patient_id: String,
    pub notes: String,
    pub alerts: HeaderAlerts,
    pub analysis: RequestState<String>,
    pub chat: RequestState<String>,
    pub transcript: Vec<ChatTurn>,
    pub triage: RequestState<Option<TriageRecommendation>>,
    pub triage_modal: TriageModalState,
}
