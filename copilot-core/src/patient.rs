use serde::{Deserialize, Serialize};

/// Family-history conditions that raise the critical-history header alert.
const CRITICAL_FAMILY_CONDITIONS: &[&str] = &["Leucemia", "Linfoma", "Cáncer"];

/// Where a patient currently sits in the consultation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientStatus {
    Waiting,
    #[serde(rename = "In_Consultation")]
    InConsultation,
    Discharged,
    Referred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryStatus {
    Active,
    Resolved,
    Managed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistory {
    pub condition: String,
    pub diagnosed_date: String,
    pub status: HistoryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyHistory {
    pub relation: String,
    pub condition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A single laboratory result. `is_abnormal` is flagged upstream by the lab
/// system; the core never re-derives it from the value and reference range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub id: String,
    pub test_name: String,
    pub date: String,
    pub value: String,
    pub unit: String,
    pub reference_range: String,
    pub is_abnormal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Full patient record as provided by the upstream record source.
///
/// The copilot reads these records but never mutates them; consultation
/// output lives in the session, not on the patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub blood_type: String,
    pub allergies: Vec<String>,
    pub medical_history: Vec<MedicalHistory>,
    pub family_history: Vec<FamilyHistory>,
    pub recent_labs: Vec<LabResult>,
    pub upcoming_appointments: Vec<String>,
    pub avatar_url: String,
    pub status: PatientStatus,
    pub wait_time_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triage_note: Option<String>,
}

impl Patient {
    /// True when any recent lab carries the abnormal flag. Drives the
    /// "recent abnormal labs" header indicator.
    pub fn has_abnormal_recent_labs(&self) -> bool {
        self.recent_labs.iter().any(|lab| lab.is_abnormal)
    }

    /// True when a family-history entry names a critical condition. Drives
    /// the "critical family history" header indicator.
    pub fn has_critical_family_history(&self) -> bool {
        self.family_history.iter().any(|entry| {
            CRITICAL_FAMILY_CONDITIONS
                .iter()
                .any(|critical| entry.condition.contains(critical))
        })
    }

    /// Family-history condition names in record order, comma-joined for the
    /// chat context line.
    pub fn family_conditions(&self) -> String {
        self.family_history
            .iter()
            .map(|entry| entry.condition.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Header alert flags computed from a patient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderAlerts {
    pub abnormal_recent_labs: bool,
    pub critical_family_history: bool,
}

impl HeaderAlerts {
    pub fn for_patient(patient: &Patient) -> Self {
        Self {
            abnormal_recent_labs: patient.has_abnormal_recent_labs(),
            critical_family_history: patient.has_critical_family_history(),
        }
    }
}
