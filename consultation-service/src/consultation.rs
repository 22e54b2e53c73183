//! Per-patient consultation sessions and the request-flow sequencer.
//!
//! Each session owns the shared notes field plus three independent flows
//! (analysis, chat, triage). Flows may run concurrently with each other but
//! never with themselves: the `Pending` transition under the session lock is
//! the in-flight guard. The external call itself runs with the lock
//! released, so other flows on the same session stay responsive.

use std::sync::Arc;

use copilot_core::{
    HeaderAlerts, Patient, RequestState, Result, Transcript, TriageModalState,
    TriageRecommendation, prompt,
};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::llm::{ANALYSIS_FALLBACK_TEXT, CHAT_FALLBACK_TEXT, CopilotClient};
use crate::models::SessionSnapshot;

/// Mutable consultation state for one patient.
pub struct ConsultationSession {
    pub id: String,
    pub patient_id: String,
    /// Free-text notes, owned by the consultation view; read by both the
    /// analysis and triage flows.
    pub notes: String,
    pub analysis: RequestState<String>,
    pub chat: RequestState<String>,
    pub transcript: Transcript,
    pub triage: RequestState<Option<TriageRecommendation>>,
}

impl ConsultationSession {
    fn new(patient_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            notes: String::new(),
            analysis: RequestState::Idle,
            chat: RequestState::Idle,
            transcript: Transcript::new(),
            triage: RequestState::Idle,
        }
    }
}

/// Drives the three request flows against their sessions.
pub struct ConsultationRunner {
    client: CopilotClient,
    sessions: DashMap<String, Arc<Mutex<ConsultationSession>>>,
}

impl ConsultationRunner {
    pub fn new(client: CopilotClient) -> Self {
        Self {
            client,
            sessions: DashMap::new(),
        }
    }

    fn session(&self, patient_id: &str) -> Arc<Mutex<ConsultationSession>> {
        self.sessions
            .entry(patient_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConsultationSession::new(patient_id))))
            .clone()
    }

    pub async fn set_notes(&self, patient_id: &str, notes: String) {
        let session = self.session(patient_id);
        session.lock().await.notes = notes;
    }

    /// Deep case analysis over the patient record and current notes.
    ///
    /// Rejected input (notes under the minimum length) short-circuits before
    /// the flow is marked pending, so the request state is untouched. A
    /// failed call settles the flow as `Failed` and the returned text is the
    /// fixed fallback placeholder.
    pub async fn run_analysis(&self, patient: &Patient) -> Result<String> {
        let session = self.session(&patient.id);

        let notes = {
            let mut guard = session.lock().await;
            prompt::validate_notes(&guard.notes)?;
            guard.analysis.begin("analysis")?;
            guard.notes.clone()
        };

        info!(patient_id = %patient.id, "starting case analysis");
        let outcome = self.client.analyze_case(patient, &notes).await;

        let mut guard = session.lock().await;
        match outcome {
            Ok(text) => {
                guard.analysis.succeed(text.clone());
                Ok(text)
            }
            Err(e) => {
                error!(patient_id = %patient.id, "case analysis failed: {}", e);
                let placeholder = e.user_text(ANALYSIS_FALLBACK_TEXT).to_string();
                guard.analysis.fail(e.to_string());
                Ok(placeholder)
            }
        }
    }

    /// One chat turn. The user message is appended to the transcript before
    /// the call resolves; the model reply (or failure placeholder) lands
    /// after settlement. History handed to the collaborator is the
    /// transcript as it stood before this turn.
    pub async fn run_chat(&self, patient: &Patient, message: String) -> Result<String> {
        prompt::validate_chat_message(&message)?;
        let session = self.session(&patient.id);

        let history = {
            let mut guard = session.lock().await;
            guard.chat.begin("chat")?;
            let history = guard.transcript.turns().to_vec();
            guard.transcript.push_user(message.clone());
            history
        };

        info!(patient_id = %patient.id, "running chat turn");
        let outcome = self.client.chat_turn(patient, &history, &message).await;

        let mut guard = session.lock().await;
        match outcome {
            Ok(reply) => {
                guard.transcript.push_model(reply.clone());
                guard.chat.succeed(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                error!(patient_id = %patient.id, "chat turn failed: {}", e);
                let placeholder = e.user_text(CHAT_FALLBACK_TEXT).to_string();
                guard.transcript.push_model(placeholder.clone());
                guard.chat.fail(e.to_string());
                Ok(placeholder)
            }
        }
    }

    /// Structured triage over the patient record and current notes.
    ///
    /// `Ok(None)` covers both a schema-invalid response and a failed call:
    /// no recommendation is available and the modal stays closed.
    pub async fn run_triage(&self, patient: &Patient) -> Result<Option<TriageRecommendation>> {
        let session = self.session(&patient.id);

        let notes = {
            let mut guard = session.lock().await;
            prompt::validate_notes(&guard.notes)?;
            guard.triage.begin("triage")?;
            guard.notes.clone()
        };

        info!(patient_id = %patient.id, "generating triage recommendation");
        let outcome = self.client.triage(patient, &notes).await;

        let mut guard = session.lock().await;
        match outcome {
            Ok(result) => {
                guard.triage.succeed(result.clone());
                Ok(result)
            }
            Err(e) => {
                error!(patient_id = %patient.id, "triage generation failed: {}", e);
                guard.triage.fail(e.to_string());
                Ok(None)
            }
        }
    }

    pub async fn snapshot(&self, patient: &Patient) -> SessionSnapshot {
        let session = self.session(&patient.id);
        let guard = session.lock().await;

        SessionSnapshot {
            session_id: guard.id.clone(),
            patient_id: guard.patient_id.clone(),
            notes: guard.notes.clone(),
            alerts: HeaderAlerts::for_patient(patient),
            analysis: guard.analysis.clone(),
            chat: guard.chat.clone(),
            transcript: guard.transcript.turns().to_vec(),
            triage: guard.triage.clone(),
            triage_modal: TriageModalState::from(&guard.triage),
        }
    }

    /// Drop a patient's session, discarding notes, transcript and results.
    pub async fn close(&self, patient_id: &str) {
        self.sessions.remove(patient_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, CHAT_FALLBACK_TEXT, CompletionBackend, CONFIG_ERROR_TEXT};
    use crate::registry::PatientRegistry;
    use async_trait::async_trait;
    use copilot_core::{ChatRole, ChatTurn, CopilotError};
    use std::result::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TRIAGE_JSON: &str = r#"{
        "diagnosis": "Síndrome febril en estudio",
        "icd10Code": "R50.9",
        "urgencyLevel": "Moderada",
        "specialtyReferral": "Medicina Interna",
        "reasoning": "Fiebre sin foco claro en paciente sin antecedentes.",
        "recommendedLabTests": []
    }"#;

    enum Script {
        Text(&'static str),
        Fail,
        NotConfigured,
    }

    struct MockBackend {
        script: Script,
        calls: AtomicUsize,
    }

    impl MockBackend {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }

        fn answer(&self) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Text(text) => Ok((*text).to_string()),
                Script::Fail => Err(BackendError::Call("service unavailable".to_string())),
                Script::NotConfigured => Err(BackendError::NotConfigured),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for MockBackend {
        async fn complete(&self, _preamble: &str, _prompt: &str) -> Result<String, BackendError> {
            self.answer()
        }

        async fn chat(
            &self,
            _preamble: &str,
            _history: &[ChatTurn],
            _message: &str,
        ) -> Result<String, BackendError> {
            self.answer()
        }
    }

    fn runner_with(backend: MockBackend) -> (Arc<MockBackend>, ConsultationRunner) {
        let backend = Arc::new(backend);
        let runner = ConsultationRunner::new(CopilotClient::new(backend.clone()));
        (backend, runner)
    }

    fn patient(id: &str) -> Patient {
        let registry = PatientRegistry::seeded();
        registry.get(id).unwrap().clone()
    }

    #[tokio::test]
    async fn short_notes_issue_no_call_and_stay_idle() {
        let (backend, runner) = runner_with(MockBackend::new(Script::Text("análisis")));
        let maria = patient("P-2024-001");

        runner.set_notes(&maria.id, "tos".to_string()).await;
        let err = runner.run_analysis(&maria).await.unwrap_err();
        assert_eq!(err, CopilotError::NotesTooShort);

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(snapshot.analysis, RequestState::Idle);
    }

    #[tokio::test]
    async fn analysis_settles_with_model_text() {
        let (_, runner) = runner_with(MockBackend::new(Script::Text("**Hipótesis Diagnóstica**")));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "moretones múltiples y fatiga".to_string())
            .await;
        let analysis = runner.run_analysis(&maria).await.unwrap();
        assert_eq!(analysis, "**Hipótesis Diagnóstica**");

        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(
            snapshot.analysis,
            RequestState::Succeeded("**Hipótesis Diagnóstica**".to_string())
        );
    }

    #[tokio::test]
    async fn analysis_failure_yields_fallback_and_failed_state() {
        let (_, runner) = runner_with(MockBackend::new(Script::Fail));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "moretones múltiples".to_string())
            .await;
        let analysis = runner.run_analysis(&maria).await.unwrap();
        assert_eq!(analysis, ANALYSIS_FALLBACK_TEXT);

        let snapshot = runner.snapshot(&maria).await;
        assert!(matches!(snapshot.analysis, RequestState::Failed(_)));
    }

    #[tokio::test]
    async fn blank_model_reply_settles_as_failure() {
        let (_, runner) = runner_with(MockBackend::new(Script::Text("   ")));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "moretones múltiples".to_string())
            .await;
        let analysis = runner.run_analysis(&maria).await.unwrap();
        assert_eq!(analysis, ANALYSIS_FALLBACK_TEXT);

        let snapshot = runner.snapshot(&maria).await;
        assert!(matches!(snapshot.analysis, RequestState::Failed(_)));
    }

    struct StalledBackend;

    #[async_trait]
    impl CompletionBackend for StalledBackend {
        async fn complete(&self, _preamble: &str, _prompt: &str) -> Result<String, BackendError> {
            std::future::pending().await
        }

        async fn chat(
            &self,
            _preamble: &str,
            _history: &[ChatTurn],
            _message: &str,
        ) -> Result<String, BackendError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn hung_call_settles_as_timeout_failure() {
        let client = CopilotClient::with_timeout(
            Arc::new(StalledBackend),
            std::time::Duration::from_millis(20),
        );
        let runner = ConsultationRunner::new(client);
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "moretones múltiples".to_string())
            .await;
        let analysis = runner.run_analysis(&maria).await.unwrap();
        assert_eq!(analysis, ANALYSIS_FALLBACK_TEXT);

        let snapshot = runner.snapshot(&maria).await;
        assert!(
            matches!(snapshot.analysis, RequestState::Failed(reason) if reason.contains("timed out"))
        );
    }

    #[tokio::test]
    async fn missing_credential_surfaces_fixed_config_text() {
        let (backend, runner) = runner_with(MockBackend::new(Script::NotConfigured));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "paciente con fiebre".to_string())
            .await;
        let analysis = runner.run_analysis(&maria).await.unwrap();
        assert_eq!(analysis, CONFIG_ERROR_TEXT);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transcript_alternates_across_successful_turns() {
        let (_, runner) = runner_with(MockBackend::new(Script::Text("respuesta clínica")));
        let maria = patient("P-2024-001");

        for question in ["¿Qué indica la leucopenia?", "¿Siguiente examen?", "¿Derivo?"] {
            runner.run_chat(&maria, question.to_string()).await.unwrap();
        }

        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(snapshot.transcript.len(), 6);
        for (i, turn) in snapshot.transcript.iter().enumerate() {
            let expected = if i % 2 == 0 { ChatRole::User } else { ChatRole::Model };
            assert_eq!(turn.role, expected);
        }
    }

    #[tokio::test]
    async fn failed_chat_turn_appends_placeholder() {
        let (_, runner) = runner_with(MockBackend::new(Script::Fail));
        let maria = patient("P-2024-001");

        let reply = runner
            .run_chat(&maria, "¿Dosis de amoxicilina?".to_string())
            .await
            .unwrap();
        assert_eq!(reply, CHAT_FALLBACK_TEXT);

        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[1].role, ChatRole::Model);
        assert_eq!(snapshot.transcript[1].text, CHAT_FALLBACK_TEXT);
    }

    #[tokio::test]
    async fn empty_chat_message_is_rejected_locally() {
        let (backend, runner) = runner_with(MockBackend::new(Script::Text("hola")));
        let maria = patient("P-2024-001");

        let err = runner.run_chat(&maria, "   ".to_string()).await.unwrap_err();
        assert_eq!(err, CopilotError::EmptyMessage);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(runner.snapshot(&maria).await.transcript.is_empty());
    }

    #[tokio::test]
    async fn triage_success_for_patient_without_history() {
        // Luisa has no allergies-independent history and no labs; the flow
        // must still produce a schema-valid recommendation, lab list empty.
        let (_, runner) = runner_with(MockBackend::new(Script::Text(TRIAGE_JSON)));
        let luisa = patient("P-2024-003");

        runner
            .set_notes(&luisa.id, "paciente con fiebre".to_string())
            .await;
        let recommendation = runner.run_triage(&luisa).await.unwrap().unwrap();
        assert_eq!(recommendation.icd10_code, "R50.9");
        assert!(recommendation.recommended_lab_tests.is_empty());

        let snapshot = runner.snapshot(&luisa).await;
        assert!(matches!(snapshot.triage_modal, TriageModalState::Ready(_)));
    }

    #[tokio::test]
    async fn triage_parse_failure_keeps_modal_closed() {
        let (_, runner) = runner_with(MockBackend::new(Script::Text(
            "No puedo generar una clasificación.",
        )));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "paciente con fiebre".to_string())
            .await;
        let recommendation = runner.run_triage(&maria).await.unwrap();
        assert!(recommendation.is_none());

        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(snapshot.triage, RequestState::Succeeded(None));
        assert_eq!(snapshot.triage_modal, TriageModalState::Closed);
    }

    #[tokio::test]
    async fn triage_call_failure_yields_no_recommendation() {
        let (_, runner) = runner_with(MockBackend::new(Script::Fail));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "paciente con fiebre".to_string())
            .await;
        let recommendation = runner.run_triage(&maria).await.unwrap();
        assert!(recommendation.is_none());

        let snapshot = runner.snapshot(&maria).await;
        assert!(matches!(snapshot.triage, RequestState::Failed(_)));
        assert_eq!(snapshot.triage_modal, TriageModalState::Closed);
    }

    struct BlockingBackend {
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl CompletionBackend for BlockingBackend {
        async fn complete(&self, _preamble: &str, _prompt: &str) -> Result<String, BackendError> {
            self.release.notified().await;
            Ok("análisis tardío".to_string())
        }

        async fn chat(
            &self,
            _preamble: &str,
            _history: &[ChatTurn],
            _message: &str,
        ) -> Result<String, BackendError> {
            self.release.notified().await;
            Ok("respuesta tardía".to_string())
        }
    }

    #[tokio::test]
    async fn repeat_trigger_is_rejected_while_pending() {
        let backend = Arc::new(BlockingBackend {
            release: tokio::sync::Notify::new(),
        });
        let runner = Arc::new(ConsultationRunner::new(CopilotClient::new(backend.clone())));
        let maria = patient("P-2024-001");

        runner
            .set_notes(&maria.id, "moretones múltiples".to_string())
            .await;

        let first = {
            let runner = runner.clone();
            let maria = maria.clone();
            tokio::spawn(async move { runner.run_analysis(&maria).await })
        };

        // Let the first trigger reach the blocked call so the flow is Pending.
        while !runner.snapshot(&maria).await.analysis.is_pending() {
            tokio::task::yield_now().await;
        }

        let err = runner.run_analysis(&maria).await.unwrap_err();
        assert_eq!(err, CopilotError::FlowBusy("analysis"));

        // Other flows on the same session are not blocked by the pending one.
        let reply = runner.run_chat(&maria, "¿Estado?".to_string());
        backend.release.notify_one();
        backend.release.notify_one();
        reply.await.unwrap();
        first.await.unwrap().unwrap();

        let snapshot = runner.snapshot(&maria).await;
        assert_eq!(
            snapshot.analysis,
            RequestState::Succeeded("análisis tardío".to_string())
        );
    }

    #[tokio::test]
    async fn closing_a_session_discards_its_state() {
        let (_, runner) = runner_with(MockBackend::new(Script::Text("hola")));
        let maria = patient("P-2024-001");

        runner.set_notes(&maria.id, "notas de prueba".to_string()).await;
        runner.close(&maria.id).await;

        let snapshot = runner.snapshot(&maria).await;
        assert!(snapshot.notes.is_empty());
        assert_eq!(snapshot.analysis, RequestState::Idle);
    }
}
