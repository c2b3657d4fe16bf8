use crate::fs::block_device::BlockDevice;
use crate::fs::fat_constants::*;
use crate::fs::fs::FsError;
use crate::fs::sector_buffer::{le_u32, SectorBuffer};
use log::debug;

/// View of one 16-byte partition table slot.
#[derive(Clone, Copy)]
pub struct PartitionEntry<'a> {
    raw: &'a [u8],
}

impl<'a> PartitionEntry<'a> {
    pub fn is_active(&self) -> bool {
        self.raw[0] == PARTITION_ACTIVE
    }

    pub fn boot_indicator(&self) -> u8 {
        self.raw[0]
    }

    pub fn partition_type(&self) -> u8 {
        self.raw[4]
    }

    pub fn start_sector(&self) -> u32 {
        le_u32(self.raw, 8)
    }

    pub fn size_in_sectors(&self) -> u32 {
        le_u32(self.raw, 12)
    }

    pub fn is_empty(&self) -> bool {
        self.partition_type() == 0 && self.size_in_sectors() == 0
    }
}

/// Master Boot Record, read from sector 0.
pub struct Mbr {
    buf: SectorBuffer<1>,
}

impl Mbr {
    pub fn read<D: BlockDevice>(device: &mut D) -> Result<Self, FsError> {
        Self::from_buffer(SectorBuffer::load(device, 0)?)
    }

    pub fn from_buffer(buf: SectorBuffer<1>) -> Result<Self, FsError> {
        if buf.u8_at(BOOT_SIG_OFFSET) != BOOT_SIG_LEAD || buf.u8_at(BOOT_SIG_OFFSET + 1) != BOOT_SIG_TRAIL {
            return Err(FsError::InvalidSignature);
        }
        Ok(Mbr { buf })
    }

    /// Slot `n` (0..=3) of the partition table.
    pub fn partition_entry(&self, n: usize) -> PartitionEntry<'_> {
        assert!(n < PARTITION_ENTRY_COUNT, "MBR has four partition slots");
        let start = PARTITION_TABLE_OFFSET + n * PARTITION_ENTRY_SIZE;
        PartitionEntry { raw: &self.buf.as_bytes()[start..start + PARTITION_ENTRY_SIZE] }
    }

    pub fn partition_entries(&self) -> impl Iterator<Item = PartitionEntry<'_>> + '_ {
        (0..PARTITION_ENTRY_COUNT).map(move |n| self.partition_entry(n))
    }

    /// First slot whose boot indicator is 0x80.
    pub fn active_partition_entry(&self) -> Result<PartitionEntry<'_>, FsError> {
        match self.partition_entries().position(|e| e.is_active()) {
            Some(n) => {
                let entry = self.partition_entry(n);
                debug!(
                    "mbr: active partition {} at lba {} ({} sectors)",
                    n,
                    entry.start_sector(),
                    entry.size_in_sectors()
                );
                Ok(entry)
            }
            None => Err(FsError::NoActivePartition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mbr_with(slots: &[(usize, u8, u32, u32)]) -> Mbr {
        let mut raw = [[0u8; SECTOR_SIZE]; 1];
        for &(n, indicator, start, size) in slots {
            let off = PARTITION_TABLE_OFFSET + n * PARTITION_ENTRY_SIZE;
            raw[0][off] = indicator;
            raw[0][off + 4] = 0x0C;
            raw[0][off + 8..off + 12].copy_from_slice(&start.to_le_bytes());
            raw[0][off + 12..off + 16].copy_from_slice(&size.to_le_bytes());
        }
        raw[0][BOOT_SIG_OFFSET] = BOOT_SIG_LEAD;
        raw[0][BOOT_SIG_OFFSET + 1] = BOOT_SIG_TRAIL;
        Mbr::from_buffer(SectorBuffer::from_sectors(0, raw)).expect("valid mbr")
    }

    #[test_case]
    fn active_entry_in_each_slot() {
        for slot in 0..4 {
            let mbr = mbr_with(&[(slot, PARTITION_ACTIVE, 2048 + slot as u32, 0x1_0000)]);
            let active = mbr.active_partition_entry().expect("no active partition");
            assert_eq!(active.start_sector(), 2048 + slot as u32);
            assert_eq!(active.size_in_sectors(), 0x1_0000);
            assert_eq!(active.partition_type(), 0x0C);
        }
    }

    #[test_case]
    fn inactive_slots_are_skipped() {
        let mbr = mbr_with(&[(0, 0x00, 63, 100), (2, PARTITION_ACTIVE, 4096, 200)]);
        assert!(!mbr.partition_entry(0).is_active());
        assert!(mbr.partition_entry(1).is_empty());
        assert_eq!(mbr.active_partition_entry().map(|e| e.start_sector()).ok(), Some(4096));
    }

    #[test_case]
    fn no_active_partition_is_an_error() {
        let mbr = mbr_with(&[(0, 0x00, 63, 100)]);
        assert!(matches!(mbr.active_partition_entry(), Err(FsError::NoActivePartition)));
    }

    #[test_case]
    fn missing_signature_is_rejected() {
        let raw = [[0u8; SECTOR_SIZE]; 1];
        assert!(matches!(Mbr::from_buffer(SectorBuffer::from_sectors(0, raw)), Err(FsError::InvalidSignature)));
    }
}
