use crate::fs::block_device::{BlockDevice, DiskError};
use crate::fs::bpb::fat_cell_position;
use crate::fs::fat_constants::*;
use crate::fs::fs::FsError;
use crate::fs::sector_buffer::le_u32;
use log::trace;

/// What a FAT cell says about the cluster after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLink {
    Next(u32),
    EndOfChain,
    /// Reserved (0, 1), bad-cluster or otherwise unusable value.
    Bad(u32),
}

impl ClusterLink {
    pub fn classify(cell: u32) -> ClusterLink {
        let value = cell & FAT_CELL_MASK;
        match value {
            FIRST_DATA_CLUSTER..=LAST_DATA_CLUSTER => ClusterLink::Next(value),
            END_OF_CHAIN_MIN..=END_OF_CHAIN_MAX => ClusterLink::EndOfChain,
            _ => ClusterLink::Bad(value),
        }
    }
}

pub struct FatTable<'a, D: BlockDevice> {
    device: &'a mut D,
    start_lba: u32,
    sectors_per_fat: u32,
    // simple cache: one sector buffer
    cache_sector: u32,
    cache: [u8; SECTOR_SIZE],
}

impl<'a, D: BlockDevice> FatTable<'a, D> {
    pub fn new(device: &'a mut D, start_lba: u32, sectors_per_fat: u32) -> Self {
        FatTable {
            device,
            start_lba,
            sectors_per_fat,
            cache_sector: u32::MAX,
            cache: [0u8; SECTOR_SIZE],
        }
    }

    fn load_sector(&mut self, sector_idx: u32) -> Result<(), DiskError> {
        if self.cache_sector == sector_idx { return Ok(()); }
        // untagged until the read succeeds
        self.cache_sector = u32::MAX;
        self.device.read_sector(self.start_lba + sector_idx, &mut self.cache)?;
        self.cache_sector = sector_idx;
        Ok(())
    }

    /// Helper to read a data-sector using the underlying device borrowed by the FatTable.
    pub fn read_data_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        self.device.read_sector(lba, buf)
    }

    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Raw FAT32 cell for `cluster`, masked to 28 bits.
    pub fn read_entry(&mut self, cluster: u32) -> Result<u32, FsError> {
        let (sector_idx, offset) = fat_cell_position(cluster);
        if sector_idx >= self.sectors_per_fat {
            return Err(FsError::ClusterOutOfRange(cluster));
        }
        self.load_sector(sector_idx)?;
        Ok(le_u32(&self.cache, offset) & FAT_CELL_MASK)
    }

    pub fn next_cluster(&mut self, cluster: u32) -> Result<ClusterLink, FsError> {
        let link = ClusterLink::classify(self.read_entry(cluster)?);
        trace!("fat: {} -> {:?}", cluster, link);
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock_device::MockDevice;

    static mut BUF: [u8; SECTOR_SIZE * 2] = [0u8; SECTOR_SIZE * 2]; // 2 sectors FAT

    fn set_cell(buf: &mut [u8], cluster: u32, value: u32) {
        let off = cluster as usize * 4;
        buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test_case]
    fn classify_cells() {
        assert_eq!(ClusterLink::classify(0), ClusterLink::Bad(0));
        assert_eq!(ClusterLink::classify(1), ClusterLink::Bad(1));
        assert_eq!(ClusterLink::classify(2), ClusterLink::Next(2));
        assert_eq!(ClusterLink::classify(0x0FFF_FFF6), ClusterLink::Next(0x0FFF_FFF6));
        assert_eq!(ClusterLink::classify(0x0FFF_FFF7), ClusterLink::Bad(0x0FFF_FFF7));
        assert_eq!(ClusterLink::classify(0x0FFF_FFF8), ClusterLink::EndOfChain);
        assert_eq!(ClusterLink::classify(0x0FFF_FFFF), ClusterLink::EndOfChain);
        // top nibble is ignored
        assert_eq!(ClusterLink::classify(0xF000_0005), ClusterLink::Next(5));
        assert_eq!(ClusterLink::classify(0xFFFF_FFFF), ClusterLink::EndOfChain);
    }

    #[test_case]
    fn fat32_chain_across_sectors() {
        unsafe {
            let buf = &mut *core::ptr::addr_of_mut!(BUF);
            buf.iter_mut().for_each(|b| *b = 0);
            set_cell(buf, 2, 3);
            set_cell(buf, 3, 200);
            set_cell(buf, 200, 0x0FFF_FFFF);
            let mut dev = MockDevice::new(&buf[..]);
            let mut fat = FatTable::new(&mut dev, 0, 2);
            assert_eq!(fat.read_entry(2), Ok(3));
            assert_eq!(fat.read_entry(200), Ok(0x0FFF_FFFF));
            assert_eq!(fat.next_cluster(2), Ok(ClusterLink::Next(3)));
            assert_eq!(fat.next_cluster(3), Ok(ClusterLink::Next(200)));
            assert_eq!(fat.next_cluster(200), Ok(ClusterLink::EndOfChain));
        }
    }

    #[test_case]
    fn cache_avoids_rereads() {
        unsafe {
            let buf = &mut *core::ptr::addr_of_mut!(BUF);
            buf.iter_mut().for_each(|b| *b = 0);
            set_cell(buf, 2, 3);
            set_cell(buf, 3, 4);
            let mut dev = MockDevice::new(&buf[..]);
            {
                let mut fat = FatTable::new(&mut dev, 0, 2);
                fat.read_entry(2).expect("read failed");
                fat.read_entry(3).expect("read failed");
                fat.read_entry(4).expect("read failed");
            }
            assert_eq!(dev.reads(), 1);
        }
    }

    #[test_case]
    fn reserved_cell_is_bad_link() {
        unsafe {
            let buf = &mut *core::ptr::addr_of_mut!(BUF);
            buf.iter_mut().for_each(|b| *b = 0);
            set_cell(buf, 2, 3);
            set_cell(buf, 3, 1);
            let mut dev = MockDevice::new(&buf[..]);
            let mut fat = FatTable::new(&mut dev, 0, 2);
            assert_eq!(fat.next_cluster(3), Ok(ClusterLink::Bad(1)));
            assert_eq!(fat.read_entry(256), Err(FsError::ClusterOutOfRange(256)));
        }
    }
}
