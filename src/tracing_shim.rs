//! Either `tracing` or no-op stand-ins with the same call syntax.
//!
//! Map code imports its macros from here rather than from `tracing`, so that logging does not have
//! to be wrapped in `#[cfg]` at every call site. The `#[instrument]` attribute is the exception and
//! is written as `#[cfg_attr(feature = "tracing", tracing::instrument)]`.

#![allow(unused_imports, unused_macros, dead_code)]

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, info_span, trace};
#[cfg(feature = "tracing")]
pub(crate) use tracing_futures::Instrument;

#[cfg(not(feature = "tracing"))]
macro_rules! event {
    ($($x:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! event_span {
    ($($x:tt)*) => {
        ()
    };
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {event as debug, event as trace, event_span as info_span};

/// Stand-in for `tracing_futures::Instrument` that leaves the future untouched.
#[cfg(not(feature = "tracing"))]
pub(crate) trait Instrument: Sized {
    /// Return `self` unchanged.
    fn instrument(self, span: ()) -> Self;
}

#[cfg(not(feature = "tracing"))]
impl<T> Instrument for T {
    fn instrument(self, _: ()) -> Self {
        self
    }
}
