//! Construction options for [`BizError`]

use crate::effect::EffectExecutor;
use crate::stack::StackInspector;
use crate::{BizError, Context, Level, LogSink};
use std::fmt;
use std::sync::Arc;

/// Frames kept when no row count is configured
pub const DEFAULT_STACK_ROWS: usize = 10;

/// Side effect run on a detached task after an error is logged.
pub type AsyncEffect = Arc<dyn Fn(Context, BizError) + Send + Sync>;

/// Everything configurable about a single [`BizError`] construction.
///
/// Each `with_*` call sets one concern and returns the options, so settings
/// apply in the order they are written and the last write to a field wins.
/// The only additive setting is [`with_skip_depth`](Self::with_skip_depth).
///
/// | Setting | Default |
/// |---|---|
/// | sink | none, required |
/// | level | [`Level::Error`] |
/// | detail | empty |
/// | caller name | resolved from the stack |
/// | stack capture | on |
/// | skip depth | `+0` |
/// | channel code / msg | empty |
/// | async effect | none |
/// | stack rows | [`DEFAULT_STACK_ROWS`] |
///
/// ```rust
/// use bizerr_error::{sink, ErrorOptions, Level};
///
/// let opts = ErrorOptions::new()
///     .with_sink(sink::null_sink())
///     .with_level(Level::Warn)
///     .with_detail(format_args!("uid={}", 42))
///     .with_channel("PAY_503", "upstream timeout")
///     .with_stack_rows(5);
///
/// assert_eq!(opts.detail(), "uid=42");
/// assert_eq!(opts.stack_rows(), 5);
/// ```
#[derive(Clone)]
pub struct ErrorOptions {
    pub(crate) sink: Option<LogSink>,
    pub(crate) level: Level,
    pub(crate) detail: String,
    pub(crate) caller_name: Option<String>,
    pub(crate) store_stack: bool,
    pub(crate) skip_depth: usize,
    pub(crate) channel_code: String,
    pub(crate) channel_msg: String,
    pub(crate) effect: Option<AsyncEffect>,
    pub(crate) stack_rows: usize,
    pub(crate) inspector: Option<Arc<dyn StackInspector>>,
    pub(crate) executor: Option<Arc<dyn EffectExecutor>>,
}

impl Default for ErrorOptions {
    fn default() -> Self {
        Self {
            sink: None,
            level: Level::Error,
            detail: String::new(),
            caller_name: None,
            store_stack: true,
            skip_depth: 0,
            channel_code: String::new(),
            channel_msg: String::new(),
            effect: None,
            stack_rows: DEFAULT_STACK_ROWS,
            inspector: None,
            executor: None,
        }
    }
}

impl ErrorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Setters (chainable)
    // =========================================================================

    /// Set the logging sink. Required.
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the detail line, such as an order or user id.
    ///
    /// Accepts anything displayable; pass `format_args!` for templates.
    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = detail.to_string();
        self
    }

    /// Report `name` instead of the resolved caller
    pub fn with_caller_name(mut self, name: impl Into<String>) -> Self {
        self.caller_name = Some(name.into());
        self
    }

    /// Toggle stack capture
    pub fn with_stack(mut self, store_stack: bool) -> Self {
        self.store_stack = store_stack;
        self
    }

    /// Skip `frames` more frames when resolving the caller.
    ///
    /// Set this in functions that build errors on behalf of their caller.
    /// Calls accumulate.
    pub fn with_skip_depth(mut self, frames: usize) -> Self {
        self.skip_depth = self.skip_depth.saturating_add(frames);
        self
    }

    /// Set the downstream code and message when a dependency caused the error
    pub fn with_channel(
        mut self,
        channel_code: impl Into<String>,
        channel_msg: impl Into<String>,
    ) -> Self {
        self.channel_code = channel_code.into();
        self.channel_msg = channel_msg.into();
        self
    }

    /// Run `effect` on a detached task after the error is logged
    pub fn with_async_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(Context, BizError) + Send + Sync + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// Like [`with_async_effect`](Self::with_async_effect) for an effect
    /// that is already shared
    pub fn with_shared_effect(mut self, effect: AsyncEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Cap the number of captured frames. Values `<= 0` are ignored.
    pub fn with_stack_rows(mut self, rows: i64) -> Self {
        if rows > 0 {
            self.stack_rows = usize::try_from(rows).unwrap_or(usize::MAX);
        }
        self
    }

    /// Use a different stack inspector
    pub fn with_inspector(mut self, inspector: Arc<dyn StackInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Use a different executor for the async effect
    pub fn with_executor(mut self, executor: Arc<dyn EffectExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn stores_stack(&self) -> bool {
        self.store_stack
    }

    /// The additive skip depth, on top of the base depth
    pub fn skip_depth(&self) -> usize {
        self.skip_depth
    }

    pub fn stack_rows(&self) -> usize {
        self.stack_rows
    }
}

impl fmt::Debug for ErrorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorOptions")
            .field("sink", &self.sink.is_some())
            .field("level", &self.level)
            .field("detail", &self.detail)
            .field("caller_name", &self.caller_name)
            .field("store_stack", &self.store_stack)
            .field("skip_depth", &self.skip_depth)
            .field("channel_code", &self.channel_code)
            .field("channel_msg", &self.channel_msg)
            .field("effect", &self.effect.is_some())
            .field("stack_rows", &self.stack_rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink;

    #[test]
    fn test_defaults() {
        let opts = ErrorOptions::new();
        assert!(!opts.has_sink());
        assert_eq!(opts.level(), Level::Error);
        assert_eq!(opts.detail(), "");
        assert!(opts.stores_stack());
        assert_eq!(opts.skip_depth(), 0);
        assert_eq!(opts.stack_rows(), DEFAULT_STACK_ROWS);
        assert!(opts.effect.is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let opts = ErrorOptions::new()
            .with_detail("a")
            .with_detail("b")
            .with_level(Level::Info)
            .with_level(Level::Warn)
            .with_stack(false)
            .with_stack(true)
            .with_channel("C1", "first")
            .with_channel("C2", "second");

        assert_eq!(opts.detail(), "b");
        assert_eq!(opts.level(), Level::Warn);
        assert!(opts.stores_stack());
        assert_eq!(opts.channel_code, "C2");
        assert_eq!(opts.channel_msg, "second");
    }

    #[test]
    fn test_skip_depth_is_additive() {
        let opts = ErrorOptions::new().with_skip_depth(1).with_skip_depth(2);
        assert_eq!(opts.skip_depth(), 3);
    }

    #[test]
    fn test_non_positive_stack_rows_ignored() {
        assert_eq!(ErrorOptions::new().with_stack_rows(0).stack_rows(), 10);
        assert_eq!(ErrorOptions::new().with_stack_rows(-3).stack_rows(), 10);
        assert_eq!(
            ErrorOptions::new()
                .with_stack_rows(5)
                .with_stack_rows(-1)
                .stack_rows(),
            5
        );
    }

    #[test]
    fn test_detail_template() {
        let order = 123;
        let opts = ErrorOptions::new().with_detail(format_args!("orderId={}", order));
        assert_eq!(opts.detail(), "orderId=123");
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let opts = ErrorOptions::new().with_sink(sink::null_sink());
        let debug = format!("{:?}", opts);
        assert!(debug.contains("sink: true"));
        assert!(debug.contains("effect: false"));
    }
}
