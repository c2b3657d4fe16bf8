// On-disk constants for the MBR and the FAT32 volume the loader reads.
// Keep these in a small module so tests and parsers can import them.

pub const SECTOR_SIZE: usize = 512;
pub const BYTES_PER_SECTOR: u16 = 512;

// Boot sector signature, shared by the MBR and the FAT32 boot sector
pub const BOOT_SIG_OFFSET: usize = 510;
pub const BOOT_SIG_LEAD: u8 = 0x55;
pub const BOOT_SIG_TRAIL: u8 = 0xAA;

// MBR partition table
pub const PARTITION_TABLE_OFFSET: usize = 446;
pub const PARTITION_ENTRY_SIZE: usize = 16;
pub const PARTITION_ENTRY_COUNT: usize = 4;
pub const PARTITION_ACTIVE: u8 = 0x80;

// FAT32 BPB field offsets
pub const BPB_BYTES_PER_SECTOR: usize = 11;
pub const BPB_SECTORS_PER_CLUSTER: usize = 13;
pub const BPB_RESERVED_SECTORS: usize = 14;
pub const BPB_NUM_FATS: usize = 16;
pub const BPB_TOTAL_SECTORS_32: usize = 32;
pub const BPB_FAT_SIZE_32: usize = 36;
pub const BPB_EXT_FLAGS: usize = 40;
pub const BPB_ROOT_CLUSTER: usize = 44;
pub const BPB_FSINFO_SECTOR: usize = 48;
pub const BPB_BACKUP_BOOT_SECTOR: usize = 50;

// Extended flags: bit 7 set means only one FAT is active
pub const EXT_FLAGS_SINGLE_FAT: u16 = 1 << 7;
pub const EXT_FLAGS_ACTIVE_FAT_MASK: u16 = 0x000F;

// Directory entries
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DIR_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;
pub const SHORT_NAME_LEN: usize = 11;
pub const DIR_ENTRY_END: u8 = 0x00;
pub const DIR_ENTRY_FREE: u8 = 0xE5;

// FAT32 cells, low 28 bits significant
pub const FAT_CELL_SIZE: usize = 4;
pub const FAT_CELL_MASK: u32 = 0x0FFF_FFFF;
pub const FIRST_DATA_CLUSTER: u32 = 2;
pub const LAST_DATA_CLUSTER: u32 = 0x0FFF_FFF6;
pub const BAD_CLUSTER: u32 = 0x0FFF_FFF7;
pub const END_OF_CHAIN_MIN: u32 = 0x0FFF_FFF8;
pub const END_OF_CHAIN_MAX: u32 = 0x0FFF_FFFF;
