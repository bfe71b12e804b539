// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the memoizing CEK substrate.
///
/// A fetch miss is *not* an error (see [`crate::fetch::fetch_value`]) — it is
/// ordinary control flow, represented as `Ok(None)`. The variants here are
/// all fatal: they indicate the code generator or the memoizer itself
/// produced a state that violates a structural invariant.
#[derive(Debug)]
pub enum Error {
    /// A structural invariant was violated (bad depth, value aliasing,
    /// degree mismatch, `BlackHole` reentry, unknown word tag, ...).
    ///
    /// The `&'static str` names the invariant that broke, for logging.
    Corrupt(&'static str),

    /// A `fetch_length` cell would have overflowed its growth sequence.
    FetchWidthOverflow,

    /// A mutation was attempted on an [`crate::exec::Evaluator`] after it
    /// was frozen by a first call to [`crate::exec::Evaluator::exec_cek`].
    Frozen,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt(msg) => write!(f, "ant: corrupt evaluator state: {msg}"),
            Self::FetchWidthOverflow => write!(f, "ant: fetch width overflow"),
            Self::Frozen => write!(f, "ant: evaluator tables are frozen after first execution"),
        }
    }
}

impl std::error::Error for Error {}

/// Evaluator result.
pub type Result<T> = std::result::Result<T, Error>;

/// Constructs a [`Error::Corrupt`], logging it at `error!` level first, per
/// the error-handling design (§7): structural violations are reported, not
/// panicked on, outside of `debug_assert!`.
pub(crate) fn corrupt(msg: &'static str) -> Error {
    log::error!("corrupt evaluator state: {msg}");
    Error::Corrupt(msg)
}
