//! Error taxonomy and the pluggable error policy.
//!
//! The engine never unwinds on its own. Every fault is described by a
//! [`DispatchError`], handed to the registry's [`ErrorHandler`], and then the
//! process is aborted. A handler that panics (see [`PanicErrorHandler`])
//! diverts control before the abort.
//!
//! The `try_*` entry points ([`Registry::try_initialize`],
//! [`Method::try_call`]) return the error as a value instead.
//!
//! [`Registry::try_initialize`]: crate::Registry::try_initialize
//! [`Method::try_call`]: crate::Method::try_call

use std::io::Write;

use thiserror::Error;

use crate::config::Output;
use crate::rtti::TypeId;

/// Result type for fallible engine operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// A fault detected while initializing or dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("open method called before the registry was initialized")]
    NotInitialized,

    #[error("unknown class {type_id}")]
    MissingClass { type_id: TypeId },

    #[error("class {derived} has unknown base {base}")]
    MissingBase { base: TypeId, derived: TypeId },

    #[error("ambiguous call to {method}({})", join_ids(.types))]
    AmbiguousCall { method: String, types: Vec<TypeId> },

    #[error("no applicable overrider for {method}({})", join_ids(.types))]
    NoOverrider { method: String, types: Vec<TypeId> },

    #[error("conflicting registrations of {type_id}: {}", .names.join(", "))]
    OdrViolation { type_id: TypeId, names: Vec<String> },

    #[error("could not find hash factors after {attempts} attempts using {buckets} buckets")]
    HashSearch { attempts: usize, buckets: usize },
}

impl DispatchError {
    /// Short name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotInitialized => "not_initialized",
            DispatchError::MissingClass { .. } => "missing_class",
            DispatchError::MissingBase { .. } => "missing_base",
            DispatchError::AmbiguousCall { .. } => "ambiguous_call",
            DispatchError::NoOverrider { .. } => "no_overrider",
            DispatchError::OdrViolation { .. } => "odr_violation",
            DispatchError::HashSearch { .. } => "hash_search",
        }
    }
}

fn join_ids(types: &[TypeId]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Receives every fault before the process is aborted.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &DispatchError);
}

/// Logs the fault, and writes it to stderr when an output is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler {
    output: Output,
}

impl DefaultErrorHandler {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: &DispatchError) {
        tracing::error!(kind = error.kind(), %error, "open method error");
        if self.output == Output::Stderr {
            let _ = writeln!(std::io::stderr().lock(), "opendispatch: {error}");
        }
    }
}

/// Panics with the [`DispatchError`] as payload.
///
/// Recover it with `std::panic::catch_unwind` and
/// `payload.downcast::<DispatchError>()`. Has no effect on control flow in
/// builds with `panic = "abort"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicErrorHandler;

impl ErrorHandler for PanicErrorHandler {
    fn handle(&self, error: &DispatchError) {
        std::panic::panic_any(error.clone());
    }
}

/// Adapts a closure into an [`ErrorHandler`].
pub struct FnErrorHandler<F>(pub F);

impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(&DispatchError) + Send + Sync,
{
    fn handle(&self, error: &DispatchError) {
        (self.0)(error)
    }
}

/// Notify `handler`, then terminate.
pub(crate) fn fail(handler: &dyn ErrorHandler, error: DispatchError) -> ! {
    handler.handle(&error);
    std::process::abort()
}
