// Network adapter modules split by external client sockets vs HTTP routes.

pub mod client;
pub mod internal;

pub use client::{spawn_session_serializer, ws_handler};
pub use internal::{create_session_handler, get_session_handler};
