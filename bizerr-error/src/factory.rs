//! Service-wide error construction

use crate::effect::EffectExecutor;
use crate::options::AsyncEffect;
use crate::{BizError, Context, ErrorOptions, ErrorProfile, LogSink};
use std::fmt;
use std::sync::Arc;

/// Holds the sink, profile and effect a service raises all its errors with.
///
/// Because the sink is supplied up front, construction through a factory
/// cannot fail. Factory methods wrap the constructor and add one frame to
/// the skip depth, so the reported caller is the code calling the factory.
///
/// ```rust
/// use bizerr_error::{sink, Context, ErrorFactory, ErrorProfile};
///
/// let errors = ErrorFactory::new(sink::null_sink())
///     .with_profile(ErrorProfile { store_stack: false, ..Default::default() });
///
/// let ctx = Context::background();
/// let err = errors.error_with(&ctx, "E200", "REJECTED", "quota exceeded", |opts| {
///     opts.with_detail(format_args!("uid={}", 42))
/// });
/// assert_eq!(err.detail(), "uid=42");
/// assert!(!err.has_stack());
/// ```
#[derive(Clone)]
pub struct ErrorFactory {
    sink: LogSink,
    profile: ErrorProfile,
    effect: Option<AsyncEffect>,
    executor: Option<Arc<dyn EffectExecutor>>,
}

impl ErrorFactory {
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            profile: ErrorProfile::default(),
            effect: None,
            executor: None,
        }
    }

    pub fn with_profile(mut self, profile: ErrorProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Run `effect` for every error this factory builds
    pub fn with_async_effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(Context, BizError) + Send + Sync + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn EffectExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn profile(&self) -> &ErrorProfile {
        &self.profile
    }

    /// Options seeded with this factory's sink, profile and effect
    pub fn options(&self) -> ErrorOptions {
        let mut opts = self.profile.options().with_sink(self.sink.clone());
        if let Some(effect) = &self.effect {
            opts = opts.with_shared_effect(effect.clone());
        }
        if let Some(executor) = &self.executor {
            opts = opts.with_executor(executor.clone());
        }
        opts
    }

    /// Build an error with the factory defaults
    #[inline(never)]
    pub fn error(
        &self,
        ctx: &Context,
        code: impl Into<String>,
        status: impl Into<String>,
        msg: impl Into<String>,
    ) -> BizError {
        let opts = self.options().with_skip_depth(1);
        BizError::construct(
            ctx,
            code.into(),
            status.into(),
            msg.into(),
            opts,
            self.sink.clone(),
        )
    }

    /// Build an error, adjusting the factory defaults with `configure` first
    #[inline(never)]
    pub fn error_with<F>(
        &self,
        ctx: &Context,
        code: impl Into<String>,
        status: impl Into<String>,
        msg: impl Into<String>,
        configure: F,
    ) -> BizError
    where
        F: FnOnce(ErrorOptions) -> ErrorOptions,
    {
        let opts = configure(self.options()).with_skip_depth(1);
        let sink = match &opts.sink {
            Some(sink) => sink.clone(),
            None => self.sink.clone(),
        };
        BizError::construct(ctx, code.into(), status.into(), msg.into(), opts, sink)
    }
}

impl fmt::Debug for ErrorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorFactory")
            .field("profile", &self.profile)
            .field("effect", &self.effect.is_some())
            .finish()
    }
}
