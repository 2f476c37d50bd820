//! Timing utilities.

use std::time::Instant;

use tracing::info;

#[cfg(feature = "timings")]
#[inline]
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    always_timed(name, f)
}

#[cfg(not(feature = "timings"))]
#[inline]
pub fn timed<R>(_: &str, f: impl FnOnce() -> R) -> R {
    f()
}

#[inline]
pub fn always_timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    let t = Instant::now();
    let r = f();
    info!(elapsed_ms = %t.elapsed().as_millis(), "{}", name);
    r
}
