use crate::fs::block_device::{BlockDevice, DiskError};
use crate::fs::fat_constants::SECTOR_SIZE;
use log::trace;

/// Read-only snapshot of `N` consecutive sectors.
///
/// The contents always match the disk as of the last successful load: a
/// failed `load` yields no buffer and a failed `reload` keeps the previous
/// contents.
pub struct SectorBuffer<const N: usize> {
    sectors: [[u8; SECTOR_SIZE]; N],
    start: u32,
}

impl<const N: usize> SectorBuffer<N> {
    pub fn load<D: BlockDevice>(device: &mut D, start: u32) -> Result<Self, DiskError> {
        let sectors = Self::read_all(device, start)?;
        Ok(SectorBuffer { sectors, start })
    }

    /// Wrap sectors that are already in memory.
    pub const fn from_sectors(start: u32, sectors: [[u8; SECTOR_SIZE]; N]) -> Self {
        SectorBuffer { sectors, start }
    }

    pub fn reload<D: BlockDevice>(&mut self, device: &mut D) -> Result<(), DiskError> {
        self.sectors = Self::read_all(device, self.start)?;
        Ok(())
    }

    fn read_all<D: BlockDevice>(device: &mut D, start: u32) -> Result<[[u8; SECTOR_SIZE]; N], DiskError> {
        trace!("sector buffer: load {} sector(s) at {}", N, start);
        let mut sectors = [[0u8; SECTOR_SIZE]; N];
        for (i, sector) in sectors.iter_mut().enumerate() {
            let lba = start.checked_add(i as u32).ok_or(DiskError::OutOfRange(start))?;
            device.read_sector(lba, sector)?;
        }
        Ok(sectors)
    }

    pub fn start_sector(&self) -> u32 {
        self.start
    }

    pub fn sector(&self, index: usize) -> &[u8; SECTOR_SIZE] {
        &self.sectors[index]
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.sectors.as_flattened()
    }

    pub fn len(&self) -> usize {
        N * SECTOR_SIZE
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn u8_at(&self, offset: usize) -> u8 {
        self.as_bytes()[offset]
    }

    pub fn u16_at(&self, offset: usize) -> u16 {
        le_u16(self.as_bytes(), offset)
    }

    pub fn u32_at(&self, offset: usize) -> u32 {
        le_u32(self.as_bytes(), offset)
    }
}

pub fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub fn le_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock_device::MockDevice;

    static mut DISK: [u8; SECTOR_SIZE * 4] = [0u8; SECTOR_SIZE * 4];

    fn disk() -> &'static mut [u8] {
        unsafe {
            let disk = &mut *core::ptr::addr_of_mut!(DISK);
            for (i, b) in disk.iter_mut().enumerate() {
                *b = (i / SECTOR_SIZE) as u8 + 1;
            }
            &mut disk[..]
        }
    }

    #[test_case]
    fn loads_consecutive_sectors() {
        let image = disk();
        let mut dev = MockDevice::new(image);
        let buf = SectorBuffer::<2>::load(&mut dev, 1).expect("load failed");
        assert_eq!(buf.start_sector(), 1);
        assert_eq!(buf.len(), 1024);
        assert_eq!(buf.as_bytes()[0], 2);
        assert_eq!(buf.as_bytes()[1023], 3);
        assert_eq!(buf.sector(1)[0], 3);
    }

    #[test_case]
    fn failed_load_yields_nothing() {
        let image = disk();
        let mut dev = MockDevice::failing_at(image, 2);
        assert!(SectorBuffer::<2>::load(&mut dev, 1).is_err());
    }

    #[test_case]
    fn failed_reload_keeps_previous_contents() {
        let image = disk();
        let mut buf = {
            let mut dev = MockDevice::new(image);
            SectorBuffer::<2>::load(&mut dev, 0).expect("load failed")
        };
        let image = disk();
        image[SECTOR_SIZE] = 0xAB;
        let mut dev = MockDevice::failing_at(image, 1);
        assert!(buf.reload(&mut dev).is_err());
        assert_eq!(buf.sector(1)[0], 2);

        let image = disk();
        image[SECTOR_SIZE] = 0xAB;
        let mut dev = MockDevice::new(image);
        buf.reload(&mut dev).expect("reload failed");
        assert_eq!(buf.sector(1)[0], 0xAB);
    }

    #[test_case]
    fn little_endian_fields() {
        let mut raw = [[0u8; SECTOR_SIZE]; 1];
        raw[0][8..12].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let buf = SectorBuffer::from_sectors(0, raw);
        assert_eq!(buf.u32_at(8), 0x1234_5678);
        assert_eq!(buf.u16_at(8), 0x5678);
        assert_eq!(buf.u8_at(11), 0x12);
    }
}
