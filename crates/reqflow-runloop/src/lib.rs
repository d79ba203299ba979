//! # reqflow RunLoop
//!
//! The two cooperative loops of the reqflow request lifecycle engine.
//!
//! ```text
//! producer ─► PriorityQueue ─► Submitter ─► provider.submit ─► LifecycleStore
//!                                                                   │
//!                   HandlerRegistry ◄─ provider.poll ◄─ Poller ◄────┘
//! ```
//!
//! ## Key Components
//!
//! - [`Submitter`]: drains the request queue, submits, retries with backoff
//! - [`Poller`]: polls submitted records and dispatches ready responses
//! - [`HandlerRegistry`]: first-match response routing
//! - [`RunState`] / [`LoopAction`]: explicit loop control state
//! - [`RetryPolicy`] / [`IdleBackoff`]: submission retries and idle sleeps
//! - [`DataProvider`] / [`RequestBuilder`]: collaborator seams

pub mod backoff;
pub mod builder;
pub mod control;
pub mod defaults;
pub mod error;
pub mod handler;
pub mod poller;
pub mod provider;
pub mod retry;
pub mod state;
pub mod submitter;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::IdleBackoff;
pub use builder::{NoopRequestBuilder, RequestBuilder, TemplateRequestBuilder};
pub use control::apply_command;
pub use defaults::{CsvAction, ErrorAction, JsonAction, RawAction};
pub use error::{RunLoopError, RunLoopResult};
pub use handler::{
    DispatchOutcome, HandlerRegistry, ResponseAction, ResponseHandler, ResponsePayload,
    resolve_content_type,
};
pub use poller::{Poller, PollerReport};
pub use provider::{DataProvider, PollItem, PollResponse, ProviderError, SubmitResponse};
pub use retry::{RetryDecision, RetryPolicy};
pub use state::{LoopAction, RunState};
pub use submitter::{Submitter, SubmitterReport};

// Re-export CancellationToken for convenience
pub use tokio_util::sync::CancellationToken;
