use crate::fs::block_device::BlockDevice;
use crate::fs::fat_constants::*;
use crate::fs::fs::FsError;
use crate::fs::sector_buffer::SectorBuffer;
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpbError {
    /// All FATs are mirrored, so there is no single active one.
    MirroringMode,
}

impl fmt::Display for BpbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BpbError::MirroringMode => write!(f, "FATs are mirrored, no single active FAT"),
        }
    }
}

/// FAT32 BIOS Parameter Block, the first sector of the partition.
///
/// Accessors read the raw little-endian fields; `validate` checks that the
/// volume is one the loader can walk.
pub struct Bpb {
    buf: SectorBuffer<1>,
}

impl Bpb {
    pub fn read<D: BlockDevice>(device: &mut D, partition_start: u32) -> Result<Self, FsError> {
        Ok(Bpb::new(SectorBuffer::load(device, partition_start)?))
    }

    pub fn new(buf: SectorBuffer<1>) -> Self {
        Bpb { buf }
    }

    pub fn validate(&self) -> Result<(), FsError> {
        if self.buf.u8_at(BOOT_SIG_OFFSET) != BOOT_SIG_LEAD || self.buf.u8_at(BOOT_SIG_OFFSET + 1) != BOOT_SIG_TRAIL {
            return Err(FsError::InvalidSignature);
        }
        if self.bytes_per_sector() != BYTES_PER_SECTOR {
            return Err(FsError::UnsupportedSectorSize(self.bytes_per_sector()));
        }
        if self.sectors_per_cluster() == 0
            || self.data_section_offset_in_sectors().is_none()
            || self.number_of_fats() == 0
            || self.fat_size_in_sectors() == 0
            || self.root_directory_starting_cluster() < FIRST_DATA_CLUSTER
            || self.cluster_count() == 0
        {
            return Err(FsError::InvalidGeometry);
        }
        Ok(())
    }

    pub fn bytes_per_sector(&self) -> u16 {
        self.buf.u16_at(BPB_BYTES_PER_SECTOR)
    }

    pub fn sectors_per_cluster(&self) -> u8 {
        self.buf.u8_at(BPB_SECTORS_PER_CLUSTER)
    }

    pub fn reserved_sector_count(&self) -> u16 {
        self.buf.u16_at(BPB_RESERVED_SECTORS)
    }

    pub fn number_of_fats(&self) -> u8 {
        self.buf.u8_at(BPB_NUM_FATS)
    }

    pub fn total_sectors(&self) -> u32 {
        self.buf.u32_at(BPB_TOTAL_SECTORS_32)
    }

    pub fn fat_size_in_sectors(&self) -> u32 {
        self.buf.u32_at(BPB_FAT_SIZE_32)
    }

    fn extended_flags(&self) -> u16 {
        self.buf.u16_at(BPB_EXT_FLAGS)
    }

    /// Bit 7 of the extended flags clear means every FAT is kept in sync.
    pub fn is_fat_mirrored(&self) -> bool {
        self.extended_flags() & EXT_FLAGS_SINGLE_FAT == 0
    }

    pub fn active_fat(&self) -> Result<u8, BpbError> {
        if self.is_fat_mirrored() {
            return Err(BpbError::MirroringMode);
        }
        Ok((self.extended_flags() & EXT_FLAGS_ACTIVE_FAT_MASK) as u8)
    }

    /// The active FAT, or FAT 0 whenever `active_fat` fails.
    pub fn first_active_fat(&self) -> u8 {
        self.active_fat().unwrap_or(0)
    }

    pub fn root_directory_starting_cluster(&self) -> u32 {
        self.buf.u32_at(BPB_ROOT_CLUSTER)
    }

    pub fn fsinfo_sector(&self) -> u16 {
        self.buf.u16_at(BPB_FSINFO_SECTOR)
    }

    pub fn backup_boot_sector(&self) -> u16 {
        self.buf.u16_at(BPB_BACKUP_BOOT_SECTOR)
    }

    /// Offset of FAT `n` from the start of the partition. `None` if it does
    /// not fit in a sector number.
    pub fn fat_offset_in_sectors(&self, n: u8) -> Option<u32> {
        (n as u32)
            .checked_mul(self.fat_size_in_sectors())?
            .checked_add(self.reserved_sector_count() as u32)
    }

    pub fn first_active_fat_offset_in_sectors(&self) -> Option<u32> {
        self.fat_offset_in_sectors(self.first_active_fat())
    }

    /// Offset of the data region (cluster 2) from the start of the partition.
    pub fn data_section_offset_in_sectors(&self) -> Option<u32> {
        self.fat_offset_in_sectors(self.number_of_fats())
    }

    /// Number of data clusters on the volume.
    pub fn cluster_count(&self) -> u32 {
        match (self.sectors_per_cluster(), self.data_section_offset_in_sectors()) {
            (0, _) | (_, None) => 0,
            (spc, Some(data)) => self.total_sectors().saturating_sub(data) / spc as u32,
        }
    }

    /// Absolute sector layout of the volume, reading FAT `fat_index`.
    pub fn geometry(&self, partition_start: u32, fat_index: u8) -> Result<VolumeGeometry, FsError> {
        let absolute = |offset: Option<u32>| offset.and_then(|o| partition_start.checked_add(o));
        let fat_start = absolute(self.fat_offset_in_sectors(fat_index)).ok_or(FsError::InvalidGeometry)?;
        let data_start = absolute(self.data_section_offset_in_sectors()).ok_or(FsError::InvalidGeometry)?;
        Ok(VolumeGeometry {
            partition_start,
            fat_start,
            data_start,
            sectors_per_cluster: self.sectors_per_cluster(),
            bytes_per_sector: self.bytes_per_sector(),
            cluster_count: self.cluster_count(),
        })
    }
}

/// Where things live on disk, in absolute sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub partition_start: u32,
    pub fat_start: u32,
    pub data_start: u32,
    pub sectors_per_cluster: u8,
    pub bytes_per_sector: u16,
    pub cluster_count: u32,
}

impl VolumeGeometry {
    /// Data clusters are numbered 2..=cluster_count + 1.
    pub fn contains_cluster(&self, cluster: u32) -> bool {
        cluster >= FIRST_DATA_CLUSTER && cluster - FIRST_DATA_CLUSTER < self.cluster_count
    }

    /// First sector of `cluster`, or `None` when the cluster is outside the
    /// volume or any of its sectors would not fit in a sector number.
    pub fn cluster_to_sector(&self, cluster: u32) -> Option<u32> {
        if !self.contains_cluster(cluster) {
            return None;
        }
        let spc = self.sectors_per_cluster as u32;
        let first = (cluster - FIRST_DATA_CLUSTER)
            .checked_mul(spc)?
            .checked_add(self.data_start)?;
        first.checked_add(spc.saturating_sub(1))?;
        Some(first)
    }

    /// Sector of the FAT holding `cluster`'s cell and the byte offset in it.
    pub fn fat_cell_location(&self, cluster: u32) -> (u32, usize) {
        let (sector, offset) = fat_cell_position(cluster);
        (self.fat_start.saturating_add(sector), offset)
    }

    pub fn cluster_size_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * self.bytes_per_sector as usize
    }
}

/// Sector within a FAT and byte offset in it of `cluster`'s cell.
pub fn fat_cell_position(cluster: u32) -> (u32, usize) {
    let byte = cluster as usize * FAT_CELL_SIZE;
    ((byte / SECTOR_SIZE) as u32, byte % SECTOR_SIZE)
}
