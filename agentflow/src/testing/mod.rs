//! Deterministic stand-ins for external collaborators.
//!
//! The stubs record every call, can be scripted to fail, and can add random latency
//! to shuffle completion order. [`ConcurrencyGauge`] counts in-flight calls.

mod gauge;
mod stubs;

pub use gauge::{ConcurrencyGauge, GaugeGuard};
pub use stubs::{StubCompletion, StubParser, StubSearch, StubSpeech};

use crate::services::Services;
use std::sync::Arc;

/// Bundles stubs into [`Services`].
#[must_use]
pub fn stub_services(
    parser: Arc<StubParser>,
    completion: Arc<StubCompletion>,
    speech: Arc<StubSpeech>,
    search: Arc<StubSearch>,
) -> Services {
    Services::new(parser, completion, speech, search)
}
