use std::sync::Arc;

use crate::use_cases::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    // Owns the set of active session loop tasks.
    pub registry: Arc<SessionRegistry>,
}
