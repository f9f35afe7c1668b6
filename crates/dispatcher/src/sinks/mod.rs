//! Output implementations
//!
//! Contains HttpOutput.

mod http;

pub use self::http::{HttpOutput, HTTP_CLIENT_TIMEOUT};
