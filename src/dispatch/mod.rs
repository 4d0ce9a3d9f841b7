//! dispatch — maps an inbound action to a downstream call and normalizes the
//! answer.
//!
//! ```text
//! ActionRequest ──parse──▶ Action ──▶ Transport<P> ──▶ collaborator
//!                  │                       │
//!                  ▼                       ▼
//!           DispatchError ──────────▶ Outcome { failed, message, data }
//! ```
//!
//! Every recognized action has exactly one transport. Unrecognized actions
//! fail with "unknown action" before any transport is touched.

mod action;
mod dispatcher;
mod error;
mod outcome;
pub mod transport;

pub use action::{Action, ActionRequest};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ErrorKind};
pub use outcome::{JsonResponse, Outcome, Reply};
pub use transport::Transport;
