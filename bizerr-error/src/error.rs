//! The BizError type

use crate::dispatch;
use crate::effect::{self, DetachedExecutor};
use crate::options::AsyncEffect;
use crate::stack::{BacktraceInspector, StackFrame, StackInspector, BASE_SKIP_DEPTH, UNKNOWN_CALLER};
use crate::{Context, ErrorOptions, Level, LogSink};
use std::fmt;
use std::sync::Arc;

/// Symbol prefix shared by the constructor frames; stack walks anchor on it.
pub(crate) const CONSTRUCTOR_PATH: &str = concat!(module_path!(), "::BizError::");

/// Source file of the constructor frames, as recorded in line tables.
pub(crate) const CONSTRUCTOR_FILE: &str = file!();

/// Constructor function names as reduced debug info records them.
pub(crate) const CONSTRUCTOR_FNS: &[&str] = &["new", "construct"];

/// Entry address of [`BizError::construct`].
///
/// Unwinders report the same address as a frame's symbol address, which
/// finds the constructor even when no symbol names are available.
pub(crate) fn construct_entry() -> usize {
    let construct: fn(&Context, String, String, String, ErrorOptions, LogSink) -> BizError =
        BizError::construct;
    construct as usize
}

/// Why a [`BizError`] could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// No sink was configured, so the error could not log itself
    #[error("no log sink configured: set one with ErrorOptions::with_sink")]
    MissingSink,
}

/// A business error that logs itself when it is created.
///
/// A `BizError` carries:
/// - `code`: machine-readable error identifier
/// - `status`: business status code
/// - `msg`: human-readable message
/// - `detail`: supplementary context such as an order id
/// - `channel_code` / `channel_msg`: what a downstream system reported
///
/// plus the caller it was raised from and, unless disabled, a bounded
/// stack. Construction renders the error, hands it to the configured sink
/// once, and optionally starts an async effect. The value is immutable
/// afterwards; clones share the same fields.
///
/// # Example
///
/// ```rust
/// use bizerr_error::{sink, BizError, Context, ErrorOptions};
///
/// let ctx = Context::background();
/// let err = BizError::new(
///     &ctx,
///     "E100",
///     "FAIL",
///     "bad input",
///     ErrorOptions::new()
///         .with_sink(sink::null_sink())
///         .with_detail("orderId=123")
///         .with_stack(false),
/// )
/// .unwrap();
///
/// assert_eq!(err.code(), "E100");
/// assert!(err.to_string().contains("code=E100, msg=bad input"));
/// assert!(!err.to_string().contains('\n'));
/// ```
#[derive(Clone)]
pub struct BizError {
    inner: Arc<Inner>,
}

struct Inner {
    code: String,
    status: String,
    msg: String,
    detail: String,
    level: Level,
    caller_name: String,
    store_stack: bool,
    stack: Vec<StackFrame>,
    skip_depth: usize,
    stack_rows: usize,
    channel_code: String,
    channel_msg: String,
    effect: Option<AsyncEffect>,
    sink: LogSink,
}

impl BizError {
    /// Build an error, log it through the configured sink, and start the
    /// async effect if one is set.
    ///
    /// Fails only when `opts` has no sink; nothing is logged in that case.
    #[inline(never)]
    pub fn new(
        ctx: &Context,
        code: impl Into<String>,
        status: impl Into<String>,
        msg: impl Into<String>,
        opts: ErrorOptions,
    ) -> crate::Result<Self> {
        let sink = opts.sink.clone().ok_or(BuildError::MissingSink)?;
        Ok(Self::construct(
            ctx,
            code.into(),
            status.into(),
            msg.into(),
            opts,
            sink,
        ))
    }

    /// The pipeline proper: resolve, capture, log, spawn.
    ///
    /// Stack depths are measured from this frame, so it must stay a frame
    /// of its own.
    #[inline(never)]
    pub(crate) fn construct(
        ctx: &Context,
        code: String,
        status: String,
        msg: String,
        opts: ErrorOptions,
        sink: LogSink,
    ) -> Self {
        let ErrorOptions {
            sink: _,
            level,
            detail,
            caller_name,
            store_stack,
            skip_depth,
            channel_code,
            channel_msg,
            effect,
            stack_rows,
            inspector,
            executor,
        } = opts;

        let skip_depth = BASE_SKIP_DEPTH.saturating_add(skip_depth);
        let inspector: Arc<dyn StackInspector> = match inspector {
            Some(inspector) => inspector,
            None => Arc::new(BacktraceInspector),
        };

        // Inspector calls must come directly from this frame: any frame in
        // between would be counted as a caller.
        let caller_name = match caller_name {
            Some(name) => name,
            None => match inspector.caller(skip_depth) {
                Some(site) => site.to_string(),
                None => UNKNOWN_CALLER.to_string(),
            },
        };

        let stack = if store_stack {
            inspector.frames(skip_depth, stack_rows)
        } else {
            Vec::new()
        };

        let err = Self {
            inner: Arc::new(Inner {
                code,
                status,
                msg,
                detail,
                level,
                caller_name,
                store_stack,
                stack,
                skip_depth,
                stack_rows,
                channel_code,
                channel_msg,
                effect,
                sink,
            }),
        };

        dispatch::dispatch(ctx, &err);

        if let Some(effect) = err.inner.effect.clone() {
            match executor {
                Some(executor) => effect::spawn(ctx, &err, effect, &*executor),
                None => effect::spawn(ctx, &err, effect, &DetachedExecutor),
            }
        }

        err
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.inner.code
    }

    /// Get the business status
    pub fn status(&self) -> &str {
        &self.inner.status
    }

    /// Get the message
    pub fn msg(&self) -> &str {
        &self.inner.msg
    }

    /// Get the detail line
    pub fn detail(&self) -> &str {
        &self.inner.detail
    }

    /// Get the downstream error code
    pub fn channel_code(&self) -> &str {
        &self.inner.channel_code
    }

    /// Get the downstream error message
    pub fn channel_msg(&self) -> &str {
        &self.inner.channel_msg
    }

    pub fn level(&self) -> Level {
        self.inner.level
    }

    /// `file:line:function()` of the code that raised the error
    pub fn caller_name(&self) -> &str {
        &self.inner.caller_name
    }

    /// Whether stack capture was enabled
    pub fn has_stack(&self) -> bool {
        self.inner.store_stack
    }

    /// Captured frames, innermost first. Empty when capture was disabled.
    pub fn stack(&self) -> &[StackFrame] {
        &self.inner.stack
    }

    /// Effective skip depth, base included
    pub fn skip_depth(&self) -> usize {
        self.inner.skip_depth
    }

    pub fn stack_rows(&self) -> usize {
        self.inner.stack_rows
    }

    pub fn has_async_effect(&self) -> bool {
        self.inner.effect.is_some()
    }

    pub(crate) fn sink(&self) -> &LogSink {
        &self.inner.sink
    }
}

// =============================================================================
// Display - the line handed to the sink
// =============================================================================

impl fmt::Display for BizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch::render(self, f)
    }
}

impl fmt::Debug for BizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BizError")
            .field("code", &self.inner.code)
            .field("status", &self.inner.status)
            .field("msg", &self.inner.msg)
            .field("detail", &self.inner.detail)
            .field("level", &self.inner.level)
            .field("caller_name", &self.inner.caller_name)
            .field("channel_code", &self.inner.channel_code)
            .field("channel_msg", &self.inner.channel_msg)
            .field("stack_frames", &self.inner.stack.len())
            .finish()
    }
}

impl std::error::Error for BizError {}
