//! Boot path: find the kernel image on the active FAT32 partition, copy it
//! to its load address and jump to it.

use crate::config::BootConfig;
use crate::fs::block_device::BlockDevice;
use crate::fs::directory::FileRecord;
use crate::fs::fs::{FsError, Volume};
use bootloader::bootinfo::{MemoryRegion, MemoryRegionType};
use bootloader::BootInfo;
use core::fmt;
use log::info;
use x86_64::VirtAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    Fs(FsError),
    ImageEmpty,
    ImageTooLarge { size: usize, max: usize },
    LoadRegionUnavailable { start: u64, len: usize },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Fs(e) => write!(f, "{}", e),
            BootError::ImageEmpty => write!(f, "kernel image is empty"),
            BootError::ImageTooLarge { size, max } => {
                write!(f, "kernel image needs {} bytes, only {} available", size, max)
            }
            BootError::LoadRegionUnavailable { start, len } => {
                write!(f, "{} bytes at {:#x} are not usable memory", len, start)
            }
        }
    }
}

impl From<FsError> for BootError {
    fn from(e: FsError) -> Self { BootError::Fs(e) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    pub file: FileRecord,
    pub bytes_copied: usize,
    pub load_address: u64,
}

/// Mount the active partition, find `config.kernel_name` in the root
/// directory and copy it to the start of `dest`.
pub fn load_kernel<D: BlockDevice>(device: &mut D, config: &BootConfig, dest: &mut [u8]) -> Result<LoadedImage, BootError> {
    let mut volume = Volume::mount(device, config.fat_selection)?;
    let file = volume.locate_in_root(&config.kernel_name)?;
    if file.file_size == 0 {
        return Err(BootError::ImageEmpty);
    }
    let size = volume.required_buffer_len(&file);
    let max = config.max_image_bytes.min(dest.len());
    if size > max {
        return Err(BootError::ImageTooLarge { size, max });
    }
    let bytes_copied = volume.copy_file_to_memory(file.first_cluster, &mut dest[..size])?;
    info!(
        "loader: {} ({} bytes) copied to {:#x}",
        file.name, file.file_size, config.load_address
    );
    Ok(LoadedImage { file, bytes_copied, load_address: config.load_address })
}

/// Whether `[start, start + len)` lies inside a single usable region.
pub fn region_is_usable(regions: &[MemoryRegion], start: u64, len: usize) -> bool {
    let end = match start.checked_add(len as u64) {
        Some(end) => end,
        None => return false,
    };
    regions.iter().any(|r| {
        r.region_type == MemoryRegionType::Usable
            && r.range.start_addr() <= start
            && end <= r.range.end_addr()
    })
}

/// The load region as a byte slice, through the bootloader's mapping of all
/// physical memory.
///
/// # Safety
///
/// Must be called at most once, and nothing else may use that physical range
/// while the slice lives.
pub unsafe fn physical_load_region(boot_info: &BootInfo, config: &BootConfig) -> Result<&'static mut [u8], BootError> {
    let start = config.load_address;
    let len = config.max_image_bytes;
    if !region_is_usable(&boot_info.memory_map, start, len) {
        return Err(BootError::LoadRegionUnavailable { start, len });
    }
    let virt = VirtAddr::new(boot_info.physical_memory_offset + start);
    Ok(core::slice::from_raw_parts_mut(virt.as_mut_ptr::<u8>(), len))
}

/// Jump to the loaded image. There is no structured hand-off; the image
/// finds itself by its fixed load address.
///
/// # Safety
///
/// `entry` must point at executable code that never returns.
pub unsafe fn hand_off(entry: VirtAddr) -> ! {
    info!("loader: handing off to {:#x}", entry.as_u64());
    let entry: extern "C" fn() -> ! = core::mem::transmute(entry.as_u64() as usize);
    entry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootloader::bootinfo::FrameRange;

    fn region(start: u64, end: u64, region_type: MemoryRegionType) -> MemoryRegion {
        MemoryRegion { range: FrameRange::new(start, end), region_type }
    }

    #[test_case]
    fn load_region_must_be_usable() {
        let map = [
            region(0x0, 0x9_F000, MemoryRegionType::Usable),
            region(0x10_0000, 0x40_0000, MemoryRegionType::Kernel),
            region(0x40_0000, 0x800_0000, MemoryRegionType::Usable),
        ];
        assert!(region_is_usable(&map, 0x0100_0000, 4 * 1024 * 1024));
        assert!(!region_is_usable(&map, 0x20_0000, 4096));
        assert!(!region_is_usable(&map, 0x7F0_0000, 0x20_0000));
        assert!(!region_is_usable(&map, u64::MAX - 0x10, 0x1000));
    }

    #[test_case]
    fn errors_display() {
        use core::fmt::Write;
        struct Sink([u8; 64], usize);
        impl Write for Sink {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                for b in s.bytes() {
                    if self.1 < self.0.len() {
                        self.0[self.1] = b;
                        self.1 += 1;
                    }
                }
                Ok(())
            }
        }
        let mut sink = Sink([0; 64], 0);
        write!(sink, "{}", BootError::Fs(FsError::NotFound)).expect("write failed");
        assert_eq!(&sink.0[..sink.1], b"file not found");
    }
}
