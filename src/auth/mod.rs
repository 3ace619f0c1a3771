pub mod password;
pub mod service;

pub use service::{AuthErrorCode, AuthFailure, AuthOutcome, AuthService, AuthSuccess};
