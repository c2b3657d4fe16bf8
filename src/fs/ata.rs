//! Polled PIO driver for the primary ATA channel.
//!
//! One command is outstanding at a time and completion is detected by
//! polling the status register; interrupts are masked with nIEN. Every wait
//! is bounded by the device's poll limit.

use crate::fs::block_device::{BlockDevice, DiskError};
use crate::fs::fat_constants::SECTOR_SIZE;
use crate::fs::port_io::PortIo;
use bitflags::bitflags;
use core::fmt;
use log::trace;

// register offsets from the I/O base
const REG_DATA: u16 = 0;
const REG_ERROR: u16 = 1;
const REG_FEATURES: u16 = 1;
const REG_SECTOR_COUNT: u16 = 2;
const REG_LBA_LO: u16 = 3;
const REG_LBA_MID: u16 = 4;
const REG_LBA_HI: u16 = 5;
const REG_DRIVE: u16 = 6;
const REG_STATUS: u16 = 7;
const REG_COMMAND: u16 = 7;

const CMD_READ_SECTORS: u8 = 0x20;
const DRIVE_LBA_MODE: u8 = 0xE0;
const DEVICE_CONTROL_NIEN: u8 = 0x02;
const WORDS_PER_SECTOR: usize = SECTOR_SIZE / 2;
const MAX_LBA: u32 = 0x0FFF_FFFF;

pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

bitflags! {
    /// Status / alternate status register.
    pub struct AtaStatus: u8 {
        const ERR = 0x01;
        const DRQ = 0x08;
        const SRV = 0x10;
        const DF = 0x20;
        const DRDY = 0x40;
        const BSY = 0x80;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaError {
    /// ERR or DF was raised; `error` is the error register at that point.
    DeviceFault { error: u8 },
    /// The device did not leave BSY or raise DRQ within the poll limit.
    Timeout,
    InvalidSectorCount,
    LbaOutOfRange(u32),
    BufferSize { expected: usize, actual: usize },
}

impl fmt::Display for AtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtaError::DeviceFault { error } => write!(f, "device fault (error register {:#04x})", error),
            AtaError::Timeout => write!(f, "device timed out"),
            AtaError::InvalidSectorCount => write!(f, "sector count must be at least 1"),
            AtaError::LbaOutOfRange(lba) => write!(f, "lba {:#x} does not fit in 28 bits", lba),
            AtaError::BufferSize { expected, actual } => {
                write!(f, "buffer holds {} bytes, transfer needs {}", actual, expected)
            }
        }
    }
}

/// I/O and control base of one ATA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaChannel {
    pub io_base: u16,
    pub control_base: u16,
}

impl AtaChannel {
    pub const PRIMARY: AtaChannel = AtaChannel { io_base: 0x1F0, control_base: 0x3F6 };

    fn reg(&self, offset: u16) -> u16 {
        self.io_base + offset
    }
}

/// The master device on a channel. The slave bit of the drive register is
/// always 0.
pub struct AtaDevice<P: PortIo> {
    ports: P,
    channel: AtaChannel,
    poll_limit: u32,
}

impl<P: PortIo> AtaDevice<P> {
    pub fn new(ports: P, channel: AtaChannel, poll_limit: u32) -> Self {
        AtaDevice { ports, channel, poll_limit }
    }

    pub fn primary_master(ports: P) -> Self {
        Self::new(ports, AtaChannel::PRIMARY, DEFAULT_POLL_LIMIT)
    }

    pub fn channel(&self) -> AtaChannel {
        self.channel
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn status(&mut self) -> AtaStatus {
        AtaStatus::from_bits_truncate(self.ports.read_u8(self.channel.reg(REG_STATUS)))
    }

    fn alternate_status(&mut self) -> AtaStatus {
        AtaStatus::from_bits_truncate(self.ports.read_u8(self.channel.control_base))
    }

    /// Reading the alternate status four times gives the device the 400ns
    /// it needs before the status register is meaningful.
    fn settle(&mut self) {
        for _ in 0..4 {
            self.alternate_status();
        }
    }

    fn wait_not_busy(&mut self) -> Result<(), AtaError> {
        for _ in 0..self.poll_limit {
            if !self.status().contains(AtaStatus::BSY) {
                return Ok(());
            }
        }
        Err(AtaError::Timeout)
    }

    fn wait_data_request(&mut self) -> Result<(), AtaError> {
        for _ in 0..self.poll_limit {
            let status = self.status();
            if status.contains(AtaStatus::BSY) {
                continue;
            }
            if status.intersects(AtaStatus::ERR | AtaStatus::DF) {
                let error = self.ports.read_u8(self.channel.reg(REG_ERROR));
                return Err(AtaError::DeviceFault { error });
            }
            if status.contains(AtaStatus::DRQ) {
                return Ok(());
            }
        }
        Err(AtaError::Timeout)
    }

    /// READ SECTORS (0x20) with 28-bit addressing. `buf` must be exactly
    /// `count * 512` bytes; it is filled in disk order.
    pub fn read_sectors(&mut self, lba: u32, count: u8, buf: &mut [u8]) -> Result<(), AtaError> {
        if count == 0 {
            return Err(AtaError::InvalidSectorCount);
        }
        if lba as u64 + count as u64 - 1 > MAX_LBA as u64 {
            return Err(AtaError::LbaOutOfRange(lba));
        }
        let expected = count as usize * SECTOR_SIZE;
        if buf.len() != expected {
            return Err(AtaError::BufferSize { expected, actual: buf.len() });
        }
        trace!("ata: read lba={:#x} count={}", lba, count);

        self.wait_not_busy()?;

        let ch = self.channel;
        let slave_bit: u8 = 0;
        self.ports.write_u8(ch.control_base, DEVICE_CONTROL_NIEN);
        self.ports.write_u8(ch.reg(REG_FEATURES), 0x00);
        self.ports.write_u8(ch.reg(REG_SECTOR_COUNT), count);
        self.ports.write_u8(ch.reg(REG_LBA_LO), lba as u8);
        self.ports.write_u8(ch.reg(REG_LBA_MID), (lba >> 8) as u8);
        self.ports.write_u8(ch.reg(REG_LBA_HI), (lba >> 16) as u8);
        self.ports.write_u8(
            ch.reg(REG_DRIVE),
            DRIVE_LBA_MODE | (slave_bit << 4) | ((lba >> 24) & 0x0F) as u8,
        );
        self.ports.write_u8(ch.reg(REG_COMMAND), CMD_READ_SECTORS);
        self.settle();

        for sector in buf.chunks_exact_mut(SECTOR_SIZE) {
            self.wait_data_request()?;
            for i in 0..WORDS_PER_SECTOR {
                let word = self.ports.read_u16(ch.reg(REG_DATA));
                sector[2 * i] = word as u8;
                sector[2 * i + 1] = (word >> 8) as u8;
            }
        }
        Ok(())
    }

    /// Single-sector read returning the sector by value.
    pub fn read_block(&mut self, lba: u32) -> Result<[u8; SECTOR_SIZE], AtaError> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.read_sectors(lba, 1, &mut sector)?;
        Ok(sector)
    }
}

impl<P: PortIo> BlockDevice for AtaDevice<P> {
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        self.read_sectors(lba, 1, &mut buf[..])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock_device::MockPorts;

    #[test_case]
    fn rejects_zero_count() {
        let mut ata = AtaDevice::primary_master(MockPorts::new(&[0x00], &[]));
        let mut buf = [0u8; 0];
        assert_eq!(ata.read_sectors(0, 0, &mut buf), Err(AtaError::InvalidSectorCount));
        assert_eq!(ata.ports().write_count(), 0);
    }

    #[test_case]
    fn rejects_lba_past_28_bits() {
        let mut ata = AtaDevice::primary_master(MockPorts::new(&[0x00], &[]));
        let mut buf = [0u8; SECTOR_SIZE];
        assert_eq!(ata.read_sectors(0x1000_0000, 1, &mut buf), Err(AtaError::LbaOutOfRange(0x1000_0000)));
    }

    #[test_case]
    fn rejects_wrong_buffer_size() {
        let mut ata = AtaDevice::primary_master(MockPorts::new(&[0x00], &[]));
        let mut buf = [0u8; SECTOR_SIZE];
        assert_eq!(
            ata.read_sectors(0, 2, &mut buf),
            Err(AtaError::BufferSize { expected: 1024, actual: 512 })
        );
    }

    #[test_case]
    fn status_bits() {
        let s = AtaStatus::from_bits_truncate(0x58);
        assert!(s.contains(AtaStatus::DRQ));
        assert!(s.contains(AtaStatus::DRDY));
        assert!(!s.contains(AtaStatus::BSY));
        assert!(!s.contains(AtaStatus::ERR));
    }
}
