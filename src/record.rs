//! The on-disk sample record: five little-endian `u64` fields, 40 bytes,
//! identical for every core's file. Layout is frozen — the decoder assumes
//! exactly this byte count for every record it reads.

/// Size in bytes of one on-disk record.
pub const RECORD_SIZE: usize = 40;

/// One delta sample, tagged with the iteration's monotonic and wall-clock
/// timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Record {
    pub monotonic_time_ns: u64,
    pub real_time_ns: u64,
    pub llc_loads: u64,
    pub llc_misses: u64,
    pub instr_retired: u64,
}

impl Record {
    /// Serialize into the fixed 40-byte little-endian layout.
    pub fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.monotonic_time_ns.to_le_bytes());
        buf[8..16].copy_from_slice(&self.real_time_ns.to_le_bytes());
        buf[16..24].copy_from_slice(&self.llc_loads.to_le_bytes());
        buf[24..32].copy_from_slice(&self.llc_misses.to_le_bytes());
        buf[32..40].copy_from_slice(&self.instr_retired.to_le_bytes());
        buf
    }

    /// Parse a record out of an exactly-`RECORD_SIZE` byte slice.
    ///
    /// # Panics
    /// Panics if `buf.len() != RECORD_SIZE`; callers are expected to chunk
    /// input to record boundaries first.
    pub fn from_bytes(buf: &[u8]) -> Record {
        assert_eq!(buf.len(), RECORD_SIZE);
        let field = |range: std::ops::Range<usize>| {
            u64::from_le_bytes(buf[range].try_into().unwrap())
        };
        Record {
            monotonic_time_ns: field(0..8),
            real_time_ns: field(8..16),
            llc_loads: field(16..24),
            llc_misses: field(24..32),
            instr_retired: field(32..40),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let r = Record {
            monotonic_time_ns: 1,
            real_time_ns: 2,
            llc_loads: 3,
            llc_misses: 4,
            instr_retired: 5,
        };
        assert_eq!(Record::from_bytes(&r.to_bytes()), r);
    }

    #[test]
    fn layout_is_little_endian() {
        let r = Record {
            monotonic_time_ns: 0x0102030405060708,
            ..Default::default()
        };
        assert_eq!(&r.to_bytes()[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
