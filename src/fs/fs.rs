use crate::config::FatSelection;
use crate::fs::block_device::{BlockDevice, DiskError};
use crate::fs::bpb::{Bpb, BpbError, VolumeGeometry};
use crate::fs::directory::{DirectorySector, FileRecord, ShortName};
use crate::fs::fat_constants::*;
use crate::fs::fat_table::{ClusterLink, FatTable};
use crate::fs::mbr::Mbr;
use core::fmt;
use log::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    Disk(DiskError),
    Bpb(BpbError),
    InvalidSignature,
    NoActivePartition,
    UnsupportedSectorSize(u16),
    InvalidGeometry,
    /// The directory chain ended without a matching name.
    NotFound,
    /// A chain reached a cell that is neither a data cluster nor end-of-chain,
    /// or ran longer than the volume has clusters.
    BadClusterChain { cluster: u32, value: u32 },
    ClusterOutOfRange(u32),
    DestinationTooSmall { needed: usize, available: usize },
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Disk(e) => write!(f, "disk error: {}", e),
            FsError::Bpb(e) => write!(f, "boot parameter block: {}", e),
            FsError::InvalidSignature => write!(f, "invalid boot signature"),
            FsError::NoActivePartition => write!(f, "no active partition in the MBR"),
            FsError::UnsupportedSectorSize(n) => write!(f, "unsupported sector size {}", n),
            FsError::InvalidGeometry => write!(f, "invalid FAT32 geometry"),
            FsError::NotFound => write!(f, "file not found"),
            FsError::BadClusterChain { cluster, value } => {
                write!(f, "bad cluster chain: cluster {} links to {:#x}", cluster, value)
            }
            FsError::ClusterOutOfRange(c) => write!(f, "cluster {} is outside the FAT", c),
            FsError::DestinationTooSmall { needed, available } => {
                write!(f, "destination holds {} bytes, file needs at least {}", available, needed)
            }
        }
    }
}

impl From<DiskError> for FsError {
    fn from(e: DiskError) -> Self { FsError::Disk(e) }
}

impl From<BpbError> for FsError {
    fn from(e: BpbError) -> Self { FsError::Bpb(e) }
}

/// A mounted FAT32 volume on the active MBR partition.
pub struct Volume<'a, D: BlockDevice> {
    device: &'a mut D,
    geometry: VolumeGeometry,
    sectors_per_fat: u32,
    root_cluster: u32,
}

impl<'a, D: BlockDevice> Volume<'a, D> {
    /// MBR, then the active partition's BPB, then the FAT chosen by `selection`.
    pub fn mount(device: &'a mut D, selection: FatSelection) -> Result<Self, FsError> {
        let partition_start = {
            let mbr = Mbr::read(device)?;
            let active = mbr.active_partition_entry()?;
            active.start_sector()
        };
        let bpb = Bpb::read(device, partition_start)?;
        if let Err(e) = bpb.validate() {
            error!("fs::mount: BPB at sector {} rejected: {}", partition_start, e);
            return Err(e);
        }
        let fat_index = selection.fat_index(&bpb)?;
        if fat_index >= bpb.number_of_fats() {
            return Err(FsError::InvalidGeometry);
        }
        let geometry = bpb.geometry(partition_start, fat_index)?;
        info!(
            "fs::mount: partition at {}, FAT {} at {}, data at {}, {} sector(s)/cluster, {} clusters",
            partition_start,
            fat_index,
            geometry.fat_start,
            geometry.data_start,
            geometry.sectors_per_cluster,
            geometry.cluster_count
        );
        Ok(Volume {
            device,
            geometry,
            sectors_per_fat: bpb.fat_size_in_sectors(),
            root_cluster: bpb.root_directory_starting_cluster(),
        })
    }

    /// Use a layout that is already known instead of reading MBR and BPB.
    pub fn with_geometry(device: &'a mut D, geometry: VolumeGeometry, sectors_per_fat: u32, root_cluster: u32) -> Self {
        Volume { device, geometry, sectors_per_fat, root_cluster }
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn root_cluster(&self) -> u32 {
        self.root_cluster
    }

    fn fat(&mut self) -> FatTable<'_, D> {
        FatTable::new(&mut *self.device, self.geometry.fat_start, self.sectors_per_fat)
    }

    fn first_cluster(&self, cluster: u32) -> Result<u32, FsError> {
        match ClusterLink::classify(cluster) {
            ClusterLink::Next(c) if self.geometry.contains_cluster(c) => Ok(c),
            _ => Err(FsError::BadClusterChain { cluster, value: cluster }),
        }
    }

    /// Follow the link out of `current`. `Ok(None)` is end-of-chain; `steps`
    /// counts links taken so far and bounds the walk by the cluster count.
    fn advance(fat: &mut FatTable<'_, D>, geometry: &VolumeGeometry, current: u32, steps: &mut u32) -> Result<Option<u32>, FsError> {
        match fat.next_cluster(current)? {
            ClusterLink::Next(next) => {
                *steps += 1;
                if !geometry.contains_cluster(next) || *steps >= geometry.cluster_count {
                    return Err(FsError::BadClusterChain { cluster: current, value: next });
                }
                Ok(Some(next))
            }
            ClusterLink::EndOfChain => Ok(None),
            ClusterLink::Bad(value) => Err(FsError::BadClusterChain { cluster: current, value }),
        }
    }

    /// Search the directory starting at `dir_cluster` for `name`.
    ///
    /// Every sector of every cluster in the directory's chain is scanned; an
    /// exhausted chain is `NotFound`, a broken one `BadClusterChain`.
    pub fn locate_file(&mut self, name: &ShortName, dir_cluster: u32) -> Result<FileRecord, FsError> {
        let geometry = self.geometry;
        let mut current = self.first_cluster(dir_cluster)?;
        let mut steps = 0;
        let mut fat = self.fat();
        loop {
            let first_sector = geometry.cluster_to_sector(current).ok_or(FsError::InvalidGeometry)?;
            for i in 0..geometry.sectors_per_cluster as u32 {
                let sector = DirectorySector::read(fat.device(), first_sector + i)?;
                if let Some(entry) = sector.find(name) {
                    let record = entry.record();
                    info!(
                        "fs: found {} in cluster {}: first cluster {}, {} bytes",
                        name, current, record.first_cluster, record.file_size
                    );
                    return Ok(record);
                }
            }
            match Self::advance(&mut fat, &geometry, current, &mut steps)? {
                Some(next) => current = next,
                None => {
                    debug!("fs: {} not in directory at cluster {}", name, dir_cluster);
                    return Err(FsError::NotFound);
                }
            }
        }
    }

    pub fn locate_in_root(&mut self, name: &ShortName) -> Result<FileRecord, FsError> {
        let root = self.root_cluster;
        self.locate_file(name, root)
    }

    /// Copy the chain starting at `first_cluster` into `dest`, whole sectors
    /// in chain order. Returns the number of bytes written.
    pub fn copy_file_to_memory(&mut self, first_cluster: u32, dest: &mut [u8]) -> Result<usize, FsError> {
        let geometry = self.geometry;
        let bytes_per_sector = geometry.bytes_per_sector as usize;
        let sectors_per_cluster = geometry.sectors_per_cluster as usize;
        let mut current = self.first_cluster(first_cluster)?;
        let mut steps = 0;
        let mut cluster_index = 0usize;
        let mut sector = [0u8; SECTOR_SIZE];
        let mut fat = self.fat();
        loop {
            let first_sector = geometry.cluster_to_sector(current).ok_or(FsError::InvalidGeometry)?;
            for i in 0..sectors_per_cluster {
                let start = (cluster_index * sectors_per_cluster + i) * bytes_per_sector;
                let end = start + SECTOR_SIZE;
                if end > dest.len() {
                    return Err(FsError::DestinationTooSmall { needed: end, available: dest.len() });
                }
                fat.read_data_sector(first_sector + i as u32, &mut sector)?;
                dest[start..end].copy_from_slice(&sector);
            }
            cluster_index += 1;
            match Self::advance(&mut fat, &geometry, current, &mut steps)? {
                Some(next) => current = next,
                None => break,
            }
        }
        let written = cluster_index * sectors_per_cluster * bytes_per_sector;
        debug!("fs: copied {} cluster(s), {} bytes from cluster {}", cluster_index, written, first_cluster);
        Ok(written)
    }

    /// Bytes `copy_file_to_memory` writes for `file`: its size rounded up to
    /// whole clusters.
    pub fn required_buffer_len(&self, file: &FileRecord) -> usize {
        let cluster = self.geometry.cluster_size_bytes();
        let clusters = (file.file_size as usize + cluster - 1) / cluster;
        clusters.max(1) * cluster
    }

    /// Locate `name` in the directory at `dir_cluster` and copy it into `dest`.
    pub fn read_file(&mut self, name: &ShortName, dir_cluster: u32, dest: &mut [u8]) -> Result<FileRecord, FsError> {
        let file = self.locate_file(name, dir_cluster)?;
        let needed = self.required_buffer_len(&file);
        if needed > dest.len() {
            return Err(FsError::DestinationTooSmall { needed, available: dest.len() });
        }
        self.copy_file_to_memory(file.first_cluster, dest)?;
        Ok(file)
    }

    /// Fill `out` with the live short-name entries of a directory, stopping at
    /// the end marker or when `out` is full. Returns how many were stored.
    pub fn list_directory(&mut self, dir_cluster: u32, out: &mut [FileRecord]) -> Result<usize, FsError> {
        let geometry = self.geometry;
        let mut current = self.first_cluster(dir_cluster)?;
        let mut steps = 0;
        let mut count = 0usize;
        let mut fat = self.fat();
        loop {
            let first_sector = geometry.cluster_to_sector(current).ok_or(FsError::InvalidGeometry)?;
            for i in 0..geometry.sectors_per_cluster as u32 {
                let sector = DirectorySector::read(fat.device(), first_sector + i)?;
                for entry in sector.entries() {
                    if entry.is_end_marker() || count == out.len() {
                        return Ok(count);
                    }
                    if entry.is_free() || entry.is_long_file_name_entry() || entry.is_volume_id() {
                        continue;
                    }
                    out[count] = entry.record();
                    count += 1;
                }
            }
            match Self::advance(&mut fat, &geometry, current, &mut steps)? {
                Some(next) => current = next,
                None => return Ok(count),
            }
        }
    }
}
