//! Error reporting for this crate.
//!
//! All errors this crate can emit implement the [`Error`] trait defined here,
//! which extends [`std::error::Error`] with source-line information and
//! an optional help message.
//!
//! [`format_error`] renders an error the way the simulator front ends
//! report them (`Line N: message`).

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// The 1-indexed source line this error occurred on, if known.
    fn line(&self) -> Option<usize> {
        None
    }

    /// A message describing how to fix the error, if one is available.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}

/// Renders an error, with its source line and help message if present.
pub fn format_error<E: Error>(err: &E) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    match err.line() {
        Some(line) => {
            let _ = write!(out, "Line {line}: {err}");
        }
        None => {
            let _ = write!(out, "{err}");
        }
    }
    if let Some(help) = err.help() {
        let _ = write!(out, "\n help: {help}");
    }

    out
}
