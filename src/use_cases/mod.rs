// Use cases layer: application workflows for the session engine.

pub mod registry;
pub mod session;
pub mod types;

pub use registry::{RegistryError, SessionRegistry};
pub use session::{SessionHandle, SessionSettings, session_task};
pub use types::SessionEvent;
