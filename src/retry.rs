//! Bounded retry for randomized search
//!
//! Several stages draw random values and check whether the result is
//! acceptable (unique-value resolution, question instantiation). Those
//! loops all go through `with_attempts`, which makes the budget explicit
//! and returns the last rejected state instead of looping forever.

/// One attempt's verdict
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, S> {
    Accept(T),
    Reject(S),
}

/// Why a bounded retry did not produce a value
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<S, E> {
    /// Every attempt was rejected; `last` is the final rejected state
    Exhausted { attempts: usize, last: S },
    /// An attempt failed outright (not a rejection; retrying cannot help)
    Failed(E),
}

/// Run `op` up to `attempts` times, returning the first accepted value.
/// The attempt index (starting at 0) is passed to `op`.
pub fn with_attempts<T, S, E, F>(attempts: usize, mut op: F) -> Result<T, RetryError<S, E>>
where
    F: FnMut(usize) -> Result<Outcome<T, S>, E>,
{
    let mut last = None;
    for attempt in 0..attempts {
        match op(attempt).map_err(RetryError::Failed)? {
            Outcome::Accept(value) => return Ok(value),
            Outcome::Reject(state) => last = Some(state),
        }
    }
    match last {
        Some(last) => Err(RetryError::Exhausted { attempts, last }),
        // Zero attempts requested; treat as immediate exhaustion with no state.
        None => unreachable!("with_attempts requires attempts > 0"),
    }
}
