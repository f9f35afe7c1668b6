//! # Contracts
//!
//! Frozen interface contracts shared by every forwarder crate.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - The payload travelling through the forwarder is opaque `Bytes`
//! - Only processors that need a structured view decode it into an [`EventList`]
//! - [`RequestContext`] carries the correlation id, span and cancellation signal of one request

mod config;
mod context;
mod error;
mod event;
mod output;
mod processor;

pub use config::*;
pub use context::RequestContext;
pub use error::*;
pub use event::*;
pub use output::Output;
pub use processor::Processor;
