//! Time source: a paired monotonic + realtime nanosecond clock read,
//! issued in that order once per engine loop iteration — never once per
//! core, so every core's record from one iteration shares an identical
//! `(mono, real)` pair.

fn clock_ns(clock: libc::clockid_t) -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid out-parameter for clock_gettime.
    let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
    assert_eq!(rc, 0, "clock_gettime failed");
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// A monotonic and a wall-clock nanosecond timestamp, sampled back to
/// back, monotonic first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub monotonic_ns: u64,
    pub real_ns: u64,
}

/// Read the current `(monotonic_ns, real_ns)` pair.
pub fn now() -> Timestamp {
    let monotonic_ns = clock_ns(libc::CLOCK_MONOTONIC);
    let real_ns = clock_ns(libc::CLOCK_REALTIME);
    Timestamp {
        monotonic_ns,
        real_ns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_decreases() {
        let a = now();
        let b = now();
        assert!(b.monotonic_ns >= a.monotonic_ns);
    }

    #[test]
    fn real_time_is_plausible_epoch_time() {
        // After 2020-01-01 in nanoseconds since epoch.
        let t = now();
        assert!(t.real_ns > 1_577_836_800_000_000_000);
    }
}
