//! Rendering and synchronous log dispatch

use crate::{BizError, Context, Level, LogSink};
use std::fmt;

/// Write the single diagnostic line, followed by the stack block when the
/// error captured one.
pub(crate) fn render(err: &BizError, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "[{}] code={}, msg={}, channelCode={}, channelMsg={}, detail={}",
        err.caller_name(),
        err.code(),
        err.msg(),
        err.channel_code(),
        err.channel_msg(),
        err.detail()
    )?;

    if err.has_stack() {
        writeln!(f)?;
        for frame in err.stack() {
            writeln!(f, "{}", frame)?;
        }
    }

    Ok(())
}

/// Pick the sink call for a level.
///
/// Every level maps to the same sink. The table is kept so per-level
/// routing can be wired in without touching the call sites.
fn route(level: Level, sink: &LogSink) -> &LogSink {
    match level {
        Level::Info => sink,
        Level::Warn => sink,
        Level::Error => sink,
    }
}

/// Log the rendered error once through its sink.
pub(crate) fn dispatch(ctx: &Context, err: &BizError) {
    let sink = route(err.level(), err.sink());
    sink(ctx, format_args!("{}", err));
}
