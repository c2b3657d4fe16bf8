//! Boot-time storage stack: polled ATA reads up to locating and copying a
//! file from the active FAT32 partition.

pub mod ata;
pub mod block_device;
pub mod bpb;
pub mod directory;
pub mod fat_constants;
pub mod fat_table;
pub mod fs;
pub mod mbr;
pub mod mock_device;
pub mod port_io;
pub mod sector_buffer;
