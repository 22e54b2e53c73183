pub mod consultation;
pub mod llm;
pub mod models;
pub mod registry;
pub mod service;

pub use consultation::{ConsultationRunner, ConsultationSession};
pub use llm::{CompletionBackend, CopilotClient, OpenRouterBackend};
pub use registry::PatientRegistry;
pub use service::{AppState, create_app};
