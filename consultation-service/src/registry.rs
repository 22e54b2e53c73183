//! In-memory patient record source.
//!
//! Stand-in for a real clinical database: records are seeded at startup and
//! read-only afterwards. Patient ids are unique within the registry.

use copilot_core::{FamilyHistory, HistoryStatus, LabResult, MedicalHistory, Patient, PatientStatus};

pub struct PatientRegistry {
    patients: Vec<Patient>,
}

impl PatientRegistry {
    pub fn seeded() -> Self {
        Self {
            patients: seed_patients(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Patient] {
        &self.patients
    }
}

fn seed_patients() -> Vec<Patient> {
    vec![
        Patient {
            id: "P-2024-001".to_string(),
            name: "Maria Gonzales".to_string(),
            age: 34,
            gender: "Femenino".to_string(),
            blood_type: "O+".to_string(),
            allergies: vec!["Penicilina".to_string()],
            medical_history: vec![
                MedicalHistory {
                    condition: "Estrés Laboral".to_string(),
                    diagnosed_date: "2023-11-15".to_string(),
                    status: HistoryStatus::Managed,
                },
                MedicalHistory {
                    condition: "Epistaxis (Sangrado nasal)".to_string(),
                    diagnosed_date: "2024-03-10".to_string(),
                    status: HistoryStatus::Resolved,
                },
            ],
            family_history: vec![
                FamilyHistory {
                    relation: "Abuela Materna".to_string(),
                    condition: "Leucemia Mieloide Aguda".to_string(),
                    note: Some("Fallecida".to_string()),
                },
                FamilyHistory {
                    relation: "Padre".to_string(),
                    condition: "Hipertensión".to_string(),
                    note: Some("Controlado".to_string()),
                },
            ],
            recent_labs: vec![
                LabResult {
                    id: "L-101".to_string(),
                    test_name: "Hemograma Completo".to_string(),
                    date: "2024-04-02".to_string(),
                    value: "3.8".to_string(),
                    unit: "mil/mm3".to_string(),
                    reference_range: "4.5 - 11.0".to_string(),
                    is_abnormal: true,
                    notes: Some("Leucopenia leve observada.".to_string()),
                },
                LabResult {
                    id: "L-102".to_string(),
                    test_name: "Hemoglobina".to_string(),
                    date: "2024-04-15".to_string(),
                    value: "10.5".to_string(),
                    unit: "g/dL".to_string(),
                    reference_range: "12.0 - 15.5".to_string(),
                    is_abnormal: true,
                    notes: Some("Anemia leve.".to_string()),
                },
            ],
            upcoming_appointments: vec!["2024-07-20 - Hematología".to_string()],
            avatar_url: "https://picsum.photos/id/64/200/200".to_string(),
            status: PatientStatus::Waiting,
            wait_time_minutes: 45,
            triage_note: Some("Moretones múltiples, fatiga.".to_string()),
        },
        Patient {
            id: "P-2024-002".to_string(),
            name: "Juan Perez".to_string(),
            age: 58,
            gender: "Masculino".to_string(),
            blood_type: "A+".to_string(),
            allergies: vec![],
            medical_history: vec![MedicalHistory {
                condition: "Hipertensión".to_string(),
                diagnosed_date: "2020-01-01".to_string(),
                status: HistoryStatus::Active,
            }],
            family_history: vec![],
            recent_labs: vec![],
            upcoming_appointments: vec![],
            avatar_url: "https://picsum.photos/id/91/200/200".to_string(),
            status: PatientStatus::Waiting,
            wait_time_minutes: 12,
            triage_note: Some("Control hipertensión arterial".to_string()),
        },
        Patient {
            id: "P-2024-003".to_string(),
            name: "Luisa Mendoza".to_string(),
            age: 22,
            gender: "Femenino".to_string(),
            blood_type: "B-".to_string(),
            allergies: vec!["Nueces".to_string()],
            medical_history: vec![],
            family_history: vec![],
            recent_labs: vec![],
            upcoming_appointments: vec![],
            avatar_url: "https://picsum.photos/id/1027/200/200".to_string(),
            status: PatientStatus::InConsultation,
            wait_time_minutes: 0,
            triage_note: Some("Dolor abdominal agudo".to_string()),
        },
    ]
}
