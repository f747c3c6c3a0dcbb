//! PMU programmer: fixed LLC-loads, LLC-misses, instructions-retired
//! encodings for Haswell/Broadwell (E5 v3). Deliberately not
//! event-table-driven — the value of this crate is sampling throughput,
//! not counter selection.

use bitflags::bitflags;

use crate::error::SamplerError;
use crate::msr::MsrHandle;

const IA32_PERF_GLOBAL_CTRL: u32 = 0x38F;
const IA32_PERFEVTSEL0: u32 = 0x186;
const IA32_PERFEVTSEL1: u32 = 0x187;
const IA32_PERFEVTSEL2: u32 = 0x188;
const IA32_PMC0: u32 = 0xC1;
const IA32_PMC1: u32 = 0xC2;
const IA32_PMC2: u32 = 0xC3;

const LLC_LOADS_EVENT: u64 = 0x2E;
const LLC_LOADS_UMASK: u64 = 0x4F;
const LLC_MISSES_EVENT: u64 = 0x2E;
const LLC_MISSES_UMASK: u64 = 0x41;
const INSTR_RETIRED_EVENT: u64 = 0xC0;
const INSTR_RETIRED_UMASK: u64 = 0x00;

bitflags! {
    /// Control bits of `IA32_PERFEVTSELx`, outside the event/umask byte
    /// fields. This crate only ever sets USR (count in ring 3) and EN
    /// (enable the counter) — OS-mode counting and interrupt-on-overflow
    /// are never needed for this sampler.
    struct EventSelectFlags: u64 {
        const USR = 1 << 16;
        const EN = 1 << 22;
    }
}

fn event_select(event: u64, umask: u64) -> u64 {
    let flags = EventSelectFlags::USR | EventSelectFlags::EN;
    event | (umask << 8) | flags.bits()
}

/// The raw counter values of the three programmed counters, in fixed
/// order (LLC loads, LLC misses, instructions retired).
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterValues {
    pub llc_loads: u64,
    pub llc_misses: u64,
    pub instr_retired: u64,
}

/// Program the three architectural counters on `msr`'s core, per spec:
/// disarm, write event-select registers, zero the counters, arm.
pub fn program(msr: &MsrHandle) -> Result<(), SamplerError> {
    msr.write(IA32_PERF_GLOBAL_CTRL, 0)?;

    msr.write(IA32_PERFEVTSEL0, event_select(LLC_LOADS_EVENT, LLC_LOADS_UMASK))?;
    msr.write(
        IA32_PERFEVTSEL1,
        event_select(LLC_MISSES_EVENT, LLC_MISSES_UMASK),
    )?;
    msr.write(
        IA32_PERFEVTSEL2,
        event_select(INSTR_RETIRED_EVENT, INSTR_RETIRED_UMASK),
    )?;

    msr.write(IA32_PMC0, 0)?;
    msr.write(IA32_PMC1, 0)?;
    msr.write(IA32_PMC2, 0)?;

    msr.write(IA32_PERF_GLOBAL_CTRL, 0x7)
}

/// Disarm all counters. Called on teardown, before closing the MSR handle.
pub fn disarm(msr: &MsrHandle) -> Result<(), SamplerError> {
    msr.write(IA32_PERF_GLOBAL_CTRL, 0)
}

/// Read the three programmed counters, in the fixed order LLC-loads,
/// LLC-misses, instructions-retired.
pub fn read_counters(msr: &MsrHandle) -> Result<CounterValues, SamplerError> {
    Ok(CounterValues {
        llc_loads: msr.read(IA32_PMC0)?,
        llc_misses: msr.read(IA32_PMC1)?,
        instr_retired: msr.read(IA32_PMC2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_select_bit_layout_matches_spec() {
        // event code, umask in 8..16, USR at bit 16, EN at bit 22.
        let v = event_select(0x2E, 0x4F);
        assert_eq!(v & 0xFF, 0x2E);
        assert_eq!((v >> 8) & 0xFF, 0x4F);
        assert_ne!(v & EventSelectFlags::USR.bits(), 0);
        assert_ne!(v & EventSelectFlags::EN.bits(), 0);
    }

    #[test]
    fn instructions_retired_has_zero_umask() {
        let v = event_select(INSTR_RETIRED_EVENT, INSTR_RETIRED_UMASK);
        assert_eq!((v >> 8) & 0xFF, 0);
        assert_eq!(v & 0xFF, 0xC0);
    }
}
