//! Prompt construction for the three copilot flows.
//!
//! Builders are deterministic and stateless: the same patient record and
//! input text always produce the same request payload. Validation of the
//! free-text inputs happens here, before any external call is issued.

use crate::error::{CopilotError, Result};
use crate::patient::Patient;

/// Notes shorter than this (trimmed) are rejected locally.
pub const MIN_NOTES_LEN: usize = 5;

/// Preamble for the deep case-analysis flow.
pub const ANALYSIS_PREAMBLE: &str = r#"Actúa como un médico especialista senior y asistente de diagnóstico clínico (Copiloto Médico).
Analiza la información del paciente con extremo detalle para encontrar correlaciones ocultas que un humano podría pasar por alto por falta de tiempo."#;

/// Fixed system instruction for the conversational flow.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "Eres MediCore, un asistente médico avanzado. Responde de forma concisa, profesional y basada en evidencia. Tu prioridad es la seguridad del paciente.";

/// Preamble for the structured triage flow. The response must be the JSON
/// object alone; the adapter treats anything else as a parse failure.
pub const TRIAGE_PREAMBLE: &str = r#"Eres un asistente de triage clínico. Analiza las notas de la consulta y el historial del paciente.
Genera una recomendación de triage, posible diagnóstico (CIE-10 aproximado) y especialidad sugerida.

Responde ÚNICAMENTE con este JSON (sin explicación, sin texto adicional):
{
  "diagnosis": "diagnóstico presuntivo principal",
  "icd10Code": "código CIE-10 estimado",
  "urgencyLevel": "Baja" | "Moderada" | "Alta" | "Crítica",
  "specialtyReferral": "especialidad médica a la que se debe derivar",
  "reasoning": "breve justificación clínica para la derivación (máx. 30 palabras)",
  "recommendedLabTests": ["examen 1", "examen 2"]
}

NUNCA mezcles texto y JSON en la respuesta."#;

/// Reject notes below the minimum useful length. No call is issued for
/// rejected input; the flow stays wherever it was. The length check runs on
/// the trimmed text, so padding whitespace cannot satisfy the minimum.
pub fn validate_notes(notes: &str) -> Result<()> {
    if notes.trim().chars().count() < MIN_NOTES_LEN {
        return Err(CopilotError::NotesTooShort);
    }
    Ok(())
}

/// Reject empty or whitespace-only chat messages.
pub fn validate_chat_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(CopilotError::EmptyMessage);
    }
    Ok(())
}

/// Full case-analysis instruction: complete patient record, current notes,
/// and the analysis objectives including the abnormal-labs safety alert and
/// source citations.
pub fn analysis_prompt(patient: &Patient, notes: &str) -> String {
    format!(
        r#"DATOS DEL PACIENTE:
{patient_json}

SÍNTOMAS ACTUALES REPORTADOS EN CONSULTA:
"{notes}"

TU OBJETIVO:
1. Identificar posibles diagnósticos basados en la tríada: Historial + Exámenes Pasados + Síntomas Actuales.
2. ALERTA CRÍTICA: Busca si hay exámenes recientes (últimos 3 meses) que muestren anormalidades y correlaciónalos con los síntomas actuales.
3. Sugerir el plan de acción inmediato y exámenes requeridos.
4. Citar fuentes médicas generales (ej. Guías Clínicas, Mayo Clinic) para validar la sospecha.

FORMATO DE RESPUESTA (Usa Markdown):
- **Alerta de Seguridad**: Si encuentras algo grave ignorado previamente.
- **Hipótesis Diagnóstica**: Lista numerada con probabilidades.
- **Justificación**: Por qué crees esto (conecta los puntos entre historial familiar, síntomas y laboratorios alterados).
- **Plan Recomendado**: Pasos a seguir."#,
        patient_json = patient_json(patient),
        notes = notes,
    )
}

/// Context line sent as the newest chat turn: patient name, age and
/// family-history conditions, then the question itself.
pub fn chat_context_line(patient: &Patient, message: &str) -> String {
    format!(
        "Contexto Paciente: {}, {} años. Antecedentes: {}. Pregunta: {}",
        patient.name,
        patient.age,
        patient.family_conditions(),
        message,
    )
}

/// Triage instruction: patient record plus consultation notes. The expected
/// shape is fixed by [`TRIAGE_PREAMBLE`].
pub fn triage_prompt(patient: &Patient, notes: &str) -> String {
    format!(
        "Paciente: {}\nNotas de consulta: \"{}\"",
        patient_json(patient),
        notes,
    )
}

fn patient_json(patient: &Patient) -> String {
    serde_json::to_string_pretty(patient).unwrap_or_else(|_| "{}".to_string())
}
