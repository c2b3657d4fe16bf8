use crate::fs::ata::AtaError;
use crate::fs::fat_constants::SECTOR_SIZE;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskError {
    Ata(AtaError),
    /// LBA past the end of the device.
    OutOfRange(u32),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::Ata(e) => write!(f, "ata: {}", e),
            DiskError::OutOfRange(lba) => write!(f, "sector {} is past the end of the disk", lba),
        }
    }
}

impl From<AtaError> for DiskError {
    fn from(e: AtaError) -> Self { DiskError::Ata(e) }
}

/// Minimal read-only BlockDevice trait used by the FAT modules.
pub trait BlockDevice {
    /// Read exactly 512 bytes from LBA into `buf`.
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        (**self).read_sector(lba, buf)
    }
}
