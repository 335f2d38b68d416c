//! The progress callback contract shared by the scanner, packer, extractor,
//! and status components.
//!
//! An optional function reference; its absence means "do not report". No
//! reference is retained outside the call that triggers it.

/// `(current, total, message)`.
pub type ProgressFn<'a> = dyn FnMut(u64, u64, Option<&str>) + 'a;

/// Invokes `progress` if present. A tiny helper so call sites read as a
/// single statement instead of an `if let Some(p) = progress { p(...) }`
/// every time.
pub(crate) fn report(progress: Option<&mut ProgressFn<'_>>, current: u64, total: u64, message: Option<&str>) {
    if let Some(p) = progress {
        p(current, total, message);
    }
}
