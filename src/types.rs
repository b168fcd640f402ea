// src/types.rs

//! Small identity types shared across the crate.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a [`Task`](crate::task::Task).
///
/// Tasks compare by reference identity; the id is that identity in a form
/// that can key maps and appear in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named lock domain. Tasks sharing a category never execute concurrently.
///
/// Implemented for string types; enums can implement it to give categories
/// a typed name:
///
/// ```
/// use taskqueue::types::ExclusivityCategory;
///
/// enum Device {
///     Camera,
/// }
///
/// impl ExclusivityCategory for Device {
///     fn identifier(&self) -> &str {
///         match self {
///             Device::Camera => "camera",
///         }
///     }
/// }
/// ```
pub trait ExclusivityCategory {
    fn identifier(&self) -> &str;
}

impl ExclusivityCategory for str {
    fn identifier(&self) -> &str {
        self
    }
}

impl ExclusivityCategory for String {
    fn identifier(&self) -> &str {
        self.as_str()
    }
}

impl<T: ExclusivityCategory + ?Sized> ExclusivityCategory for &T {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// Render a list of task ids as `#1, #2`.
pub(crate) fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
