//! Detached, panic-isolated side effects
//!
//! An effect runs once per constructed error on a task of its own. Nothing
//! waits for it, nothing cancels it, and a panic inside it is reported
//! through the error's sink and then dropped.

use crate::options::AsyncEffect;
use crate::stack;
use crate::{BizError, Context, LogSink};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::thread;

/// Upper bound, in bytes, on the stack dump reported for a panicking effect
pub const PANIC_STACK_CAPACITY: usize = 3000;

/// A unit of work handed to an [`EffectExecutor`]
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where effects run.
///
/// Implementations start `task` without waiting for it. Returning an error
/// means the task was never started; it is reported and dropped.
pub trait EffectExecutor: Send + Sync {
    fn execute(&self, task: Task) -> io::Result<()>;
}

/// The default executor: unbounded and fire-and-forget.
///
/// Inside a Tokio runtime the task goes to the blocking pool, since effects
/// are plain synchronous closures. Outside one it gets its own thread. A
/// runtime that is shutting down drops the task without running it; that
/// is reported through the sink like a refused spawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedExecutor;

impl EffectExecutor for DetachedExecutor {
    fn execute(&self, task: Task) -> io::Result<()> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(task));
                Ok(())
            }
            Err(_) => thread::Builder::new()
                .name("bizerr-effect".to_string())
                .spawn(task)
                .map(drop),
        }
    }
}

/// How far a task got in being handed to an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handoff {
    Submitting,
    /// Dropped unrun before `execute` returned
    DroppedEarly,
    Accepted,
    Settled,
}

fn lock(handoff: &Mutex<Handoff>) -> MutexGuard<'_, Handoff> {
    handoff.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Travels inside the task and reports it if the executor drops it unrun.
///
/// A drop during `execute` is left to [`spawn`], which then knows whether
/// the executor returned an error of its own.
struct Unstarted {
    handoff: Arc<Mutex<Handoff>>,
    ctx: Context,
    sink: LogSink,
    armed: bool,
}

impl Drop for Unstarted {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut handoff = lock(&self.handoff);
        let stage = *handoff;
        match stage {
            Handoff::Submitting => *handoff = Handoff::DroppedEarly,
            Handoff::Accepted => {
                *handoff = Handoff::Settled;
                drop(handoff);
                report_dropped(&self.sink, &self.ctx);
            }
            Handoff::DroppedEarly | Handoff::Settled => {}
        }
    }
}

fn report_dropped(sink: &LogSink, ctx: &Context) {
    sink(ctx, format_args!("SafeGo spawn failed:effect dropped before running"));
}

/// Hand `effect` to `executor`, running it against a snapshot of `err`.
///
/// A task the executor refuses, or accepts and later drops unrun, is
/// reported once through the sink.
pub(crate) fn spawn(
    ctx: &Context,
    err: &BizError,
    effect: AsyncEffect,
    executor: &dyn EffectExecutor,
) {
    let handoff = Arc::new(Mutex::new(Handoff::Submitting));
    let unstarted = Unstarted {
        handoff: handoff.clone(),
        ctx: ctx.clone(),
        sink: err.sink().clone(),
        armed: true,
    };
    let snapshot = err.clone();
    let task: Task = Box::new(move || {
        let mut unstarted = unstarted;
        unstarted.armed = false;
        run_guarded(unstarted.ctx.clone(), snapshot, effect);
    });

    let result = executor.execute(task);
    let mut state = lock(&handoff);
    let stage = *state;
    match result {
        Err(e) => {
            *state = Handoff::Settled;
            drop(state);
            (err.sink())(ctx, format_args!("SafeGo spawn failed:{}", e));
        }
        Ok(()) => match stage {
            Handoff::Submitting => *state = Handoff::Accepted,
            Handoff::DroppedEarly => {
                *state = Handoff::Settled;
                drop(state);
                report_dropped(err.sink(), ctx);
            }
            Handoff::Accepted | Handoff::Settled => {}
        },
    }
}

thread_local! {
    static IN_EFFECT: Cell<bool> = const { Cell::new(false) };
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Marks the current thread as running an effect until dropped.
struct EffectScope;

impl EffectScope {
    fn enter() -> Self {
        IN_EFFECT.with(|flag| flag.set(true));
        let _ = PANIC_STACK.try_with(|slot| slot.borrow_mut().take());
        EffectScope
    }
}

impl Drop for EffectScope {
    fn drop(&mut self) {
        let _ = IN_EFFECT.try_with(|flag| flag.set(false));
    }
}

/// Chain a panic hook that records the stack of panics raised inside an
/// effect.
///
/// The hook runs before unwinding, while the panicking frames are still on
/// the stack. Panics inside effects are reported through the sink instead
/// of the previous hook; all others go to the previous hook unchanged.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !IN_EFFECT.try_with(Cell::get).unwrap_or(false) {
                previous(info);
                return;
            }
            let stack = panic_stack();
            let _ = PANIC_STACK.try_with(|slot| *slot.borrow_mut() = Some(stack));
        }));
    });
}

fn run_guarded(ctx: Context, err: BizError, effect: AsyncEffect) {
    install_panic_hook();
    let sink = err.sink().clone();
    let effect_ctx = ctx.clone();

    let outcome = {
        let _scope = EffectScope::enter();
        panic::catch_unwind(AssertUnwindSafe(move || effect(effect_ctx, err)))
    };
    if let Err(payload) = outcome {
        // Replaced hooks leave nothing recorded; the late stack still
        // shows where the effect was started.
        let stack = PANIC_STACK
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten()
            .unwrap_or_else(panic_stack);
        sink(
            &ctx,
            format_args!("SafeGo has panic:{}\n{}", panic_message(payload.as_ref()), stack),
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Frames of the panic runtime that sit above the panicking function
fn is_panic_machinery(name: &str) -> bool {
    name.contains("panicking::")
        || matches!(
            stack::short_name(name),
            "rust_panic_with_hook"
                | "begin_panic_handler"
                | "begin_panic"
                | "__rust_end_short_backtrace"
                | "rust_begin_unwind"
                | "panic_fmt"
                | "panic"
                | "panic_display"
                | "unwrap_failed"
                | "expect_failed"
                | "panic_bounds_check"
        )
}

fn is_machinery_frame(frame: &stack::Resolved) -> bool {
    frame.name.as_deref().is_some_and(is_panic_machinery)
}

/// Only the first frames are searched for the panic runtime.
const MACHINERY_SCAN: usize = 48;

/// The current stack from the panicking function outwards, bounded by
/// [`PANIC_STACK_CAPACITY`].
fn panic_stack() -> String {
    let frames = stack::capture();
    let scanned = &frames[..frames.len().min(MACHINERY_SCAN)];
    let start = match scanned.iter().position(is_machinery_frame) {
        Some(first) => {
            first
                + frames[first..]
                    .iter()
                    .take_while(|frame| is_machinery_frame(frame))
                    .count()
        }
        None => 0,
    };

    let mut out = String::new();
    for frame in &frames[start..] {
        let _ = writeln!(
            out,
            "{}\n\t{}:{} (0x{:x})",
            frame.name.as_deref().unwrap_or("??"),
            frame.file_string(),
            frame.line.unwrap_or(0),
            frame.address,
        );
        if out.len() > PANIC_STACK_CAPACITY {
            break;
        }
    }
    truncate_at_boundary(&mut out, PANIC_STACK_CAPACITY);
    out
}

fn truncate_at_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
