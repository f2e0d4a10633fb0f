//! Optional retry around a whole request.
//!
//! The pipeline itself never retries. Callers that want resilience against
//! flaky connections wrap [`crate::Client::get_acs`] in [`with_retries`].

use crate::error::Result;
use log::warn;
use std::time::Duration;

const BACKOFF_MS: [u64; 3] = [100, 300, 700];

/// Run `f` up to `attempts` times, sleeping between tries, as long as it
/// fails with a transient error. Any other error is returned at once.
pub fn with_retries<T>(attempts: u32, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let attempts = attempts.max(1);
    let mut tried = 0;
    loop {
        tried += 1;
        match f() {
            Err(e) if e.is_transient() && tried < attempts => {
                let idx = (tried as usize - 1).min(BACKOFF_MS.len() - 1);
                warn!("Call failed ({e}). Retrying...");
                std::thread::sleep(Duration::from_millis(BACKOFF_MS[idx]));
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcsError;

    #[test]
    fn retries_transient_failures() {
        let mut calls = 0;
        let out = with_retries(3, || {
            calls += 1;
            if calls < 2 {
                Err(AcsError::Transport("reset".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(out.unwrap(), 2);
    }

    #[test]
    fn gives_up_after_attempts() {
        let mut calls = 0;
        let out: Result<()> = with_retries(2, || {
            calls += 1;
            Err(AcsError::Transport("reset".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let mut calls = 0;
        let out: Result<()> = with_retries(5, || {
            calls += 1;
            Err(AcsError::Validation("bad".into()))
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }
}
