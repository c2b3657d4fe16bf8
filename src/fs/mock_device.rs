use crate::fs::ata::{AtaChannel, AtaError};
use crate::fs::block_device::{BlockDevice, DiskError};
use crate::fs::fat_constants::SECTOR_SIZE;
use crate::fs::port_io::PortIo;

/// Disk image held in memory, for tests and the demo path.
pub struct MockDevice<'a> {
    pub buf: &'a [u8], // must be multiple of 512
    fail_at: Option<u32>,
    reads: usize,
}

impl<'a> MockDevice<'a> {
    pub fn new(buf: &'a [u8]) -> Self { MockDevice { buf, fail_at: None, reads: 0 } }

    /// Every read of `lba` fails with a device fault.
    pub fn failing_at(buf: &'a [u8], lba: u32) -> Self {
        MockDevice { buf, fail_at: Some(lba), reads: 0 }
    }

    pub fn sector_count(&self) -> u32 { (self.buf.len() / SECTOR_SIZE) as u32 }

    /// Number of sector reads served so far, failed ones included.
    pub fn reads(&self) -> usize { self.reads }
}

impl<'a> BlockDevice for MockDevice<'a> {
    fn read_sector(&mut self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), DiskError> {
        self.reads += 1;
        if self.fail_at == Some(lba) {
            return Err(DiskError::Ata(AtaError::DeviceFault { error: 0x40 }));
        }
        if lba >= self.sector_count() {
            return Err(DiskError::OutOfRange(lba));
        }
        let start = lba as usize * SECTOR_SIZE;
        buf.copy_from_slice(&self.buf[start..start + SECTOR_SIZE]);
        Ok(())
    }
}

const MAX_RECORDED_WRITES: usize = 64;

/// Scripted ATA register file.
///
/// Each read of the status register consumes the next byte of the status
/// script (the last one repeats); the alternate status port returns the most
/// recent status without consuming. Data-port reads hand out `data` as
/// little-endian words. Register writes are recorded in order.
pub struct MockPorts<'a> {
    channel: AtaChannel,
    status_script: &'a [u8],
    status_pos: usize,
    current_status: u8,
    data: &'a [u8],
    data_pos: usize,
    error_reg: u8,
    writes: [(u16, u8); MAX_RECORDED_WRITES],
    write_len: usize,
    status_reads: usize,
}

impl<'a> MockPorts<'a> {
    pub fn new(status_script: &'a [u8], data: &'a [u8]) -> Self {
        MockPorts {
            channel: AtaChannel::PRIMARY,
            status_script,
            status_pos: 0,
            current_status: 0,
            data,
            data_pos: 0,
            error_reg: 0,
            writes: [(0, 0); MAX_RECORDED_WRITES],
            write_len: 0,
            status_reads: 0,
        }
    }

    pub fn with_error_register(mut self, value: u8) -> Self {
        self.error_reg = value;
        self
    }

    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes[..self.write_len]
    }

    pub fn write_count(&self) -> usize {
        self.write_len
    }

    /// The value last written to `port`, if any.
    pub fn last_write_to(&self, port: u16) -> Option<u8> {
        self.writes().iter().rev().find(|(p, _)| *p == port).map(|(_, v)| *v)
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads
    }

    /// Bytes of `data` handed out through the data port so far.
    pub fn data_consumed(&self) -> usize {
        self.data_pos
    }

    fn next_status(&mut self) -> u8 {
        self.status_reads += 1;
        if let Some(&s) = self.status_script.get(self.status_pos) {
            self.status_pos += 1;
            self.current_status = s;
        } else if let Some(&last) = self.status_script.last() {
            self.current_status = last;
        }
        self.current_status
    }
}

impl<'a> PortIo for MockPorts<'a> {
    fn read_u8(&mut self, port: u16) -> u8 {
        let base = self.channel.io_base;
        if port == base + 7 {
            self.next_status()
        } else if port == self.channel.control_base {
            self.current_status
        } else if port == base + 1 {
            self.error_reg
        } else {
            0
        }
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        if port != self.channel.io_base {
            return 0;
        }
        let lo = self.data.get(self.data_pos).copied().unwrap_or(0);
        let hi = self.data.get(self.data_pos + 1).copied().unwrap_or(0);
        self.data_pos += 2;
        u16::from_le_bytes([lo, hi])
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        if self.write_len < MAX_RECORDED_WRITES {
            self.writes[self.write_len] = (port, value);
            self.write_len += 1;
        }
    }
}
