//! Unwrap helpers with good error messages.
//!
//! These replace `unwrap()` and `expect()` in test code and report the
//! caller's location through `#[track_caller]`.

use std::fmt::Debug;

/// Unwrap a `Result`, panicking with context on error.
///
/// # Example
///
/// ```rust
/// use issp_test_helpers::must;
///
/// let result: Result<i32, &str> = Ok(42);
/// assert_eq!(must(result), 42);
/// ```
///
/// # Panics
///
/// Panics if the result is `Err`, with a message including the error value.
#[track_caller]
pub fn must<T, E: Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("must: unexpected Err: {e:?}"),
    }
}

/// Unwrap an `Option`, panicking with a custom message if `None`.
///
/// # Panics
///
/// Panics if the option is `None`, with the provided message.
#[track_caller]
pub fn must_some<T>(option: Option<T>, msg: &str) -> T {
    match option {
        Some(v) => v,
        None => panic!("must_some: {msg}"),
    }
}

/// Unwrap the error of a `Result` that is expected to fail.
///
/// # Panics
///
/// Panics if the result is `Ok`.
#[track_caller]
pub fn must_err<T: Debug, E>(result: Result<T, E>) -> E {
    match result {
        Ok(v) => panic!("must_err: unexpected Ok: {v:?}"),
        Err(e) => e,
    }
}

/// Poll `condition` until it holds or `timeout_ms` elapses.
///
/// Returns whether the condition became true.
pub fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_ok() {
        let r: Result<u8, &str> = Ok(7);
        assert_eq!(must(r), 7);
    }

    #[test]
    #[should_panic(expected = "must: unexpected Err")]
    fn test_must_err_panics() {
        let r: Result<u8, &str> = Err("nope");
        must(r);
    }

    #[test]
    fn test_must_err_returns_error() {
        let r: Result<u8, &str> = Err("nope");
        assert_eq!(must_err(r), "nope");
    }

    #[test]
    fn test_wait_until() {
        let start = std::time::Instant::now();
        assert!(wait_until(100, || start.elapsed().as_millis() >= 10));
        assert!(!wait_until(5, || false));
    }
}
