//! # bizerr-error
//!
//! Self-logging business errors for service code.
//!
//! ## Design Philosophy
//!
//! - **Triple**: every error carries a `code`, a business `status` and a `msg`
//! - **Log at birth**: the error is rendered and handed to the caller's sink
//!   while it is being constructed, so call sites never log separately
//! - **Caller capture**: the constructing function and a bounded stack are
//!   recorded, with an additive skip depth for wrapper functions
//! - **Side effects**: an optional callback (metrics, alerting) runs on a
//!   detached task and can never take the caller down with a panic
//!
//! ## Usage
//!
//! ```rust
//! use bizerr_error::{sink, BizError, Context, ErrorOptions};
//!
//! fn load_order(ctx: &Context, id: u64) -> Result<(), BizError> {
//!     let opts = ErrorOptions::new()
//!         .with_sink(sink::stderr_sink())
//!         .with_detail(format_args!("orderId={}", id))
//!         .with_stack(false);
//!     let err = BizError::new(ctx, "E100", "FAIL", "bad input", opts)
//!         .expect("sink is set");
//!     Err(err)
//! }
//!
//! let err = load_order(&Context::background(), 123).unwrap_err();
//! assert_eq!(err.code(), "E100");
//! assert!(err.to_string().contains("detail=orderId=123"));
//! ```
//!
//! ## Principles
//!
//! - Construction without a sink is rejected with [`BuildError::MissingSink`]
//! - Nothing on a `BizError` changes after it is returned
//! - The level is recorded but every level goes to the same sink

mod context;
mod dispatch;
mod effect;
mod error;
mod factory;
mod level;
mod options;
mod profile;
pub mod sink;
mod stack;

pub use context::Context;
pub use effect::{DetachedExecutor, EffectExecutor, Task, PANIC_STACK_CAPACITY};
pub use error::{BizError, BuildError};
pub use factory::ErrorFactory;
pub use level::Level;
pub use options::{AsyncEffect, ErrorOptions, DEFAULT_STACK_ROWS};
pub use profile::{ErrorProfile, ProfileError};
pub use sink::LogSink;
pub use stack::{
    BacktraceInspector, CallSite, StackFrame, StackInspector, BASE_SKIP_DEPTH, UNKNOWN_CALLER,
};

/// Result of [`BizError::new`]
pub type Result<T> = std::result::Result<T, BuildError>;
