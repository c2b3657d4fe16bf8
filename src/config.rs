//! Boot configuration. Everything is fixed at build time; there is nothing
//! to read it from this early.

use crate::fs::ata::DEFAULT_POLL_LIMIT;
use crate::fs::bpb::{Bpb, BpbError};
use crate::fs::directory::ShortName;
use log::warn;

/// Name of the image the loader looks for in the root directory.
pub const KERNEL_FILE_NAME: ShortName = ShortName::new(*b"KERNEL  BIN");

/// Physical address the image is copied to and entered at.
pub const KERNEL_LOAD_ADDRESS: u64 = 0x0100_0000;

/// Largest image the loader will place at `KERNEL_LOAD_ADDRESS`.
pub const MAX_KERNEL_IMAGE_BYTES: usize = 4 * 1024 * 1024;

/// Which FAT copy the loader follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatSelection {
    /// The active FAT, or FAT 0 when the FATs are mirrored.
    FirstActiveOrZero,
    /// The active FAT; mirrored volumes are rejected.
    StrictActive,
}

impl FatSelection {
    pub fn fat_index(&self, bpb: &Bpb) -> Result<u8, BpbError> {
        match self {
            FatSelection::FirstActiveOrZero => {
                if bpb.is_fat_mirrored() {
                    warn!("bpb: FATs are mirrored, reading FAT 0");
                }
                Ok(bpb.first_active_fat())
            }
            FatSelection::StrictActive => bpb.active_fat(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    pub kernel_name: ShortName,
    pub load_address: u64,
    pub max_image_bytes: usize,
    pub ata_poll_limit: u32,
    pub fat_selection: FatSelection,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            kernel_name: KERNEL_FILE_NAME,
            load_address: KERNEL_LOAD_ADDRESS,
            max_image_bytes: MAX_KERNEL_IMAGE_BYTES,
            ata_poll_limit: DEFAULT_POLL_LIMIT,
            fat_selection: FatSelection::FirstActiveOrZero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fat_constants::SECTOR_SIZE;
    use crate::fs::sector_buffer::SectorBuffer;

    fn bpb_with_flags(flags: u16) -> Bpb {
        let mut raw = [[0u8; SECTOR_SIZE]; 1];
        raw[0][40..42].copy_from_slice(&flags.to_le_bytes());
        Bpb::new(SectorBuffer::from_sectors(0, raw))
    }

    #[test_case]
    fn fallback_policy_reads_fat_zero_when_mirrored() {
        assert_eq!(FatSelection::FirstActiveOrZero.fat_index(&bpb_with_flags(0x0003)), Ok(0));
        assert_eq!(FatSelection::FirstActiveOrZero.fat_index(&bpb_with_flags(0x0081)), Ok(1));
    }

    #[test_case]
    fn strict_policy_rejects_mirrored() {
        assert_eq!(FatSelection::StrictActive.fat_index(&bpb_with_flags(0x0000)), Err(BpbError::MirroringMode));
        assert_eq!(FatSelection::StrictActive.fat_index(&bpb_with_flags(0x0082)), Ok(2));
    }

    #[test_case]
    fn defaults() {
        let config = BootConfig::default();
        assert_eq!(config.kernel_name, "KERNEL  BIN");
        assert_eq!(config.load_address, 0x0100_0000);
        assert_eq!(config.fat_selection, FatSelection::FirstActiveOrZero);
    }
}
