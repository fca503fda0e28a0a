//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::app::orchestrator::{ExportConfig, ExportOrchestrator};
use crate::domain::RecordSource;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ExportOrchestrator>,
    pub record_source: Arc<dyn RecordSource>,
}

impl AppState {
    #[must_use]
    pub fn new(record_source: Arc<dyn RecordSource>, config: ExportConfig) -> Self {
        Self {
            orchestrator: Arc::new(ExportOrchestrator::new(record_source.clone(), config)),
            record_source,
        }
    }
}
