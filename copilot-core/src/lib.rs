pub mod chat;
pub mod error;
pub mod patient;
pub mod prompt;
pub mod state;
pub mod triage;

// Re-export commonly used types
pub use chat::{ChatRole, ChatTurn, Transcript};
pub use error::{CopilotError, Result};
pub use patient::{
    FamilyHistory, HeaderAlerts, HistoryStatus, LabResult, MedicalHistory, Patient, PatientStatus,
};
pub use state::RequestState;
pub use triage::{TriageModalState, TriageRecommendation, UrgencyLevel, parse_recommendation};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_append_then_settle() {
        // Two-phase commit on the transcript: the user turn lands before the
        // call resolves, the model turn after.
        let mut transcript = Transcript::new();
        let mut chat: RequestState<String> = RequestState::Idle;

        chat.begin("chat").unwrap();
        transcript.push_user("¿Qué indica una leucopenia leve?");
        assert_eq!(transcript.len(), 1);
        assert!(chat.is_pending());

        transcript.push_model("Puede indicar supresión medular; correlacionar con clínica.");
        chat.succeed("Puede indicar supresión medular; correlacionar con clínica.".to_string());

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[0].role, ChatRole::User);
        assert_eq!(transcript.turns()[1].role, ChatRole::Model);
    }
}
