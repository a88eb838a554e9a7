//! Timestamp helpers.
//!
//! Stored timestamps are `i64` microseconds since the Unix epoch. [`now_micros`]
//! never returns a value lower than one it already handed out, so hide
//! timestamps and creation times do not regress when the wall clock steps
//! backwards.

#![allow(clippy::missing_const_for_fn)]

use chrono::{NaiveDateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const MICROS_PER_SECOND: i64 = 1_000_000;

/// High-water mark of handed-out timestamps.
static LAST_SYSTEM_TIME_US: AtomicI64 = AtomicI64::new(0);

/// Convert chrono `NaiveDateTime` to microseconds since Unix epoch.
#[inline]
#[must_use]
pub fn naive_to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

/// Convert microseconds since Unix epoch to chrono `NaiveDateTime`.
///
/// Values outside chrono's range clamp to its minimum/maximum instead of
/// panicking.
#[inline]
#[must_use]
pub fn micros_to_naive(micros: i64) -> NaiveDateTime {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let sub_micros = micros.rem_euclid(MICROS_PER_SECOND);
    let nsecs = u32::try_from(sub_micros * 1000).unwrap_or(0);
    Utc.timestamp_opt(secs, nsecs)
        .single()
        .unwrap_or(if micros < 0 {
            chrono::DateTime::<Utc>::MIN_UTC
        } else {
            chrono::DateTime::<Utc>::MAX_UTC
        })
        .naive_utc()
}

/// Current time in microseconds since Unix epoch, monotonic across calls.
#[inline]
#[must_use]
pub fn now_micros() -> i64 {
    let current = Utc::now().timestamp_micros();
    let previous = LAST_SYSTEM_TIME_US.fetch_max(current, Ordering::Relaxed);
    if previous > current {
        tracing::debug!(
            current,
            previous,
            "wall clock behind last issued timestamp; reusing high-water mark"
        );
        return previous;
    }
    current
}
