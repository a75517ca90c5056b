//! Caller and stack introspection
//!
//! Depths are counted the way a runtime caller lookup counts them from
//! inside the inspector: `0` is the inspector, `1` is the constructor and
//! [`BASE_SKIP_DEPTH`] is the code that called the constructor. Every
//! wrapping layer adds one.

use std::fmt;
use std::path::{Path, PathBuf};

/// Depth of the function that called the constructor
pub const BASE_SKIP_DEPTH: usize = 2;

/// Identity reported when the caller frame cannot be resolved
pub const UNKNOWN_CALLER: &str = "??:0:??()";

/// The resolved identity of a calling function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = Path::new(&self.file)
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| self.file.as_str().into());
        write!(f, "{}:{}:{}()", base, self.line, self.function)
    }
}

/// One captured stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub address: usize,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (0x{:x})", self.file, self.line, self.address)
    }
}

/// Resolves who constructed an error and what the stack looked like.
///
/// Implementations must never panic. Running out of frames is not an
/// error: `caller` returns `None` and `frames` returns what it found.
pub trait StackInspector: Send + Sync {
    /// The function at `skip`
    fn caller(&self, skip: usize) -> Option<CallSite>;

    /// Up to `rows` frames starting at `skip`
    fn frames(&self, skip: usize, rows: usize) -> Vec<StackFrame>;
}

/// [`StackInspector`] backed by the `backtrace` crate.
///
/// The walk is anchored on the [`BizError`](crate::BizError) constructor
/// frames, so helpers and unwinder frames underneath it never shift the
/// depth. Inlined functions are reported as their own frames when debug
/// info is available. Without debug info the constructor is still found by
/// address, but files and lines come back as `??` and `0`. If it cannot be
/// found at all, every lookup degrades to [`UNKNOWN_CALLER`] and an empty
/// stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktraceInspector;

impl StackInspector for BacktraceInspector {
    fn caller(&self, skip: usize) -> Option<CallSite> {
        let frame = walk(skip, 1).into_iter().next()?;
        let function = frame
            .name
            .as_deref()
            .map(short_name)
            .unwrap_or("??")
            .to_string();
        Some(CallSite {
            file: frame.file_string(),
            line: frame.line.unwrap_or(0),
            function,
        })
    }

    fn frames(&self, skip: usize, rows: usize) -> Vec<StackFrame> {
        walk(skip, rows)
            .into_iter()
            .map(|frame| StackFrame {
                file: frame.file_string(),
                line: frame.line.unwrap_or(0),
                address: frame.address,
            })
            .collect()
    }
}

/// One function on the stack; a physical frame holding inlined calls
/// yields several of these.
pub(crate) struct Resolved {
    pub(crate) name: Option<String>,
    pub(crate) file: Option<PathBuf>,
    pub(crate) line: Option<u32>,
    pub(crate) address: usize,
    /// Start of the physical function containing `address`
    pub(crate) entry: usize,
}

impl Resolved {
    pub(crate) fn file_string(&self) -> String {
        self.file
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "??".to_string())
    }
}

fn resolve(frame: &backtrace::Frame) -> Vec<Resolved> {
    let address = frame.ip() as usize;
    let entry = frame.symbol_address() as usize;
    let mut out = Vec::new();
    backtrace::resolve_frame(frame, |symbol| {
        out.push(Resolved {
            name: symbol.name().map(|name| format!("{:#}", name)),
            file: symbol.filename().map(Path::to_path_buf),
            line: symbol.lineno(),
            address,
            entry,
        });
    });
    if out.is_empty() {
        out.push(Resolved {
            name: None,
            file: None,
            line: None,
            address,
            entry,
        });
    }
    out
}

fn trace() -> Vec<backtrace::Frame> {
    let mut raw = Vec::new();
    backtrace::trace(|frame| {
        raw.push(frame.clone());
        true
    });
    raw
}

/// Every function on the current stack, innermost first.
pub(crate) fn capture() -> Vec<Resolved> {
    trace().iter().flat_map(resolve).collect()
}

/// Whether `frame` belongs to the [`BizError`](crate::BizError) constructor.
///
/// Full debug info and symbol tables give the whole path. Line tables only
/// give the bare function name, so that is paired with the source file.
/// With neither, the entry address still identifies `construct`.
fn is_constructor(frame: &Resolved) -> bool {
    use crate::error::{construct_entry, CONSTRUCTOR_FILE, CONSTRUCTOR_FNS, CONSTRUCTOR_PATH};

    if frame.entry != 0 && frame.entry == construct_entry() {
        return true;
    }
    let Some(name) = frame.name.as_deref() else {
        return false;
    };
    if name.trim_start_matches('<').starts_with(CONSTRUCTOR_PATH) {
        return true;
    }
    CONSTRUCTOR_FNS.contains(&without_generics(name))
        && frame
            .file
            .as_deref()
            .is_some_and(|file| file.ends_with(CONSTRUCTOR_FILE))
}

/// Collect up to `count` functions starting at depth `skip`.
fn walk(skip: usize, count: usize) -> Vec<Resolved> {
    if count == 0 {
        return Vec::new();
    }

    let offset = skip.saturating_sub(BASE_SKIP_DEPTH);
    let mut out = Vec::new();
    let mut anchored = false;
    let mut next_index: Option<usize> = None;

    let raw = trace();
    for resolved in raw.iter().flat_map(resolve) {
        let index = match next_index {
            Some(index) => index,
            None => {
                if is_constructor(&resolved) {
                    anchored = true;
                    continue;
                }
                if !anchored {
                    continue;
                }
                0
            }
        };
        next_index = Some(index + 1);

        if index < offset {
            continue;
        }
        out.push(resolved);
        if out.len() >= count {
            break;
        }
    }

    out
}

/// `new<&str, &str>` gives `new`. Qualified paths like `<A as B>::f` are
/// left alone.
fn without_generics(name: &str) -> &str {
    match name.find('<') {
        Some(at) if at > 0 => &name[..at],
        _ => name,
    }
}

/// Last meaningful segment of a demangled path: `app::orders::load` gives
/// `load`, `app::run::{{closure}}` gives `run`.
pub(crate) fn short_name(full: &str) -> &str {
    without_generics(full)
        .rsplit("::")
        .find(|seg| !seg.is_empty() && !seg.starts_with('{') && !seg.starts_with('<'))
        .unwrap_or("??")
}
