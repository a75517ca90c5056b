//! Log sinks
//!
//! A sink is the caller-supplied logging function every [`BizError`](crate::BizError)
//! writes itself to. It receives the request [`Context`] and pre-built
//! format arguments, mirroring a `(ctx, format, args...)` logger.

use crate::Context;
use std::fmt;
use std::sync::Arc;

/// The logging function a [`BizError`](crate::BizError) writes itself to.
pub type LogSink = Arc<dyn Fn(&Context, fmt::Arguments<'_>) + Send + Sync>;

/// Wrap a closure as a [`LogSink`].
///
/// ```rust
/// use bizerr_error::{sink, Context};
///
/// let log = sink::from_fn(|_ctx, args| println!("{}", args));
/// log(&Context::background(), format_args!("{}", "hello"));
/// ```
pub fn from_fn<F>(f: F) -> LogSink
where
    F: Fn(&Context, fmt::Arguments<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Print every line to stderr, prefixed with the context when it has values.
pub fn stderr_sink() -> LogSink {
    from_fn(|ctx, args| {
        if ctx.is_empty() {
            eprintln!("{}", args);
        } else {
            eprintln!("{} {}", ctx, args);
        }
    })
}

/// Forward every line to `tracing` under the `bizerr` target.
///
/// All lines are emitted as `ERROR` events: the sink call carries no level,
/// matching the pass-through routing in the dispatcher.
pub fn tracing_sink() -> LogSink {
    from_fn(|ctx, args| {
        tracing::error!(target: "bizerr", context = %ctx, "{}", args);
    })
}

/// Discard everything.
pub fn null_sink() -> LogSink {
    from_fn(|_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_from_fn_receives_arguments() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let sink = from_fn(move |ctx, args| {
            captured
                .lock()
                .unwrap()
                .push(format!("{} {}", ctx.value("uid").unwrap_or("-"), args));
        });

        let ctx = Context::background().with_value("uid", "7");
        sink(&ctx, format_args!("code={}", "E1"));
        sink(&Context::background(), format_args!("plain"));

        let lines = lines.lock().unwrap();
        assert_eq!(lines.as_slice(), ["7 code=E1", "- plain"]);
    }

    #[test]
    fn test_builtin_sinks_do_not_panic() {
        let ctx = Context::background().with_value("uid", "1");
        stderr_sink()(&ctx, format_args!("stderr line"));
        tracing_sink()(&ctx, format_args!("tracing line"));
        null_sink()(&ctx, format_args!("dropped"));
    }
}
