//! Application services: the export pipeline and shared handler state.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{ExportBody, ExportConfig, ExportOrchestrator, ExportOutput};
pub use state::AppState;
