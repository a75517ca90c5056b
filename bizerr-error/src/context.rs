//! Request-scoped context handed to sinks and effects

use std::fmt;
use std::sync::Arc;

/// Key-value pairs describing the request an error was raised in.
///
/// A `Context` is passed by reference into [`BizError::new`](crate::BizError::new),
/// forwarded to the log sink, and cloned into the async effect. Cloning is
/// cheap; adding a value copies the pairs once.
///
/// ```rust
/// use bizerr_error::Context;
///
/// let ctx = Context::background()
///     .with_value("trace_id", "4bf92f35")
///     .with_value("uid", "42");
///
/// assert_eq!(ctx.value("uid"), Some("42"));
/// assert_eq!(ctx.value("missing"), None);
/// ```
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<Vec<(&'static str, String)>>,
}

impl Context {
    /// An empty context
    pub fn background() -> Self {
        Self::default()
    }

    /// Return a new context with `key` set. A later value for the same key
    /// shadows the earlier one.
    pub fn with_value(&self, key: &'static str, value: impl Into<String>) -> Self {
        let mut values = Vec::with_capacity(self.values.len() + 1);
        values.extend(self.values.iter().filter(|(k, _)| *k != key).cloned());
        values.push((key, value.into()));
        Self {
            values: Arc::new(values),
        }
    }

    /// Look up a value by key
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All pairs in insertion order
    pub fn values(&self) -> &[(&'static str, String)] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}
