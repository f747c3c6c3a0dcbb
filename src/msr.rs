//! MSR gateway: typed 64-bit read/write of a per-core model-specific
//! register, via the `/dev/cpu/<n>/msr` device node with the register
//! address as the file offset.

use std::fs::OpenOptions;

use crate::error::SamplerError;

/// Handle to one logical CPU's MSR device node.
///
/// Requires the `msr` kernel module to be loaded and, typically, root.
#[derive(Debug)]
pub struct MsrHandle {
    core: u32,
    file: std::fs::File,
}

impl MsrHandle {
    /// Open the MSR device for `core`. Inability to open (usually
    /// insufficient privilege) is a distinct, fatal error.
    pub fn open(core: u32) -> Result<Self, SamplerError> {
        let path = format!("/dev/cpu/{core}/msr");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| SamplerError::MsrOpen { core, source })?;
        Ok(MsrHandle { core, file })
    }

    /// Atomically read the 8-byte register at `register`.
    pub fn read(&self, register: u32) -> Result<u64, SamplerError> {
        let mut buf = [0u8; 8];
        nix::sys::uio::pread(&self.file, &mut buf, register as i64).map_err(
            |source| SamplerError::MsrIo {
                core: self.core,
                register,
                op: "read",
                source,
            },
        )?;
        Ok(u64::from_ne_bytes(buf))
    }

    /// Atomically write `value` to the 8-byte register at `register`.
    pub fn write(&self, register: u32, value: u64) -> Result<(), SamplerError> {
        nix::sys::uio::pwrite(&self.file, &value.to_ne_bytes(), register as i64)
            .map_err(|source| SamplerError::MsrIo {
                core: self.core,
                register,
                op: "write",
                source,
            })?;
        Ok(())
    }

    pub fn core(&self) -> u32 {
        self.core
    }
}
