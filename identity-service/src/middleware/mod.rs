pub mod auth;

pub use auth::{require_full_session, session_middleware, ClientMeta, CurrentSession};
