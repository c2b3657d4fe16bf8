#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(kloader_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use bootloader::{entry_point, BootInfo};
use core::panic::PanicInfo;
use kloader_os::config::BootConfig;
use kloader_os::fs::ata::{AtaChannel, AtaDevice};
use kloader_os::fs::block_device::BlockDevice;
use kloader_os::fs::directory::FileRecord;
use kloader_os::fs::fs::Volume;
use kloader_os::fs::port_io::X86PortIo;
use kloader_os::loader::{self, BootError};
use kloader_os::{halt, logging, println};
use log::{debug, Level};
use x86_64::VirtAddr;

entry_point!(kernel_main);

fn kernel_main(boot_info: &'static BootInfo) -> ! {
    kloader_os::init();
    println!("kloader: loading kernel image");

    #[cfg(test)]
    test_main();

    let config = BootConfig::default();
    let ports = unsafe { X86PortIo::new() };
    let mut disk = AtaDevice::new(ports, AtaChannel::PRIMARY, config.ata_poll_limit);

    if logging::enabled(Level::Debug) {
        list_root(&mut disk, &config);
    }

    let dest = match unsafe { loader::physical_load_region(boot_info, &config) } {
        Ok(dest) => dest,
        Err(e) => halt(&e),
    };
    let image = match loader::load_kernel(&mut disk, &config, dest) {
        Ok(image) => image,
        Err(e) => halt(&e),
    };
    println!(
        "kloader: {} loaded, {} bytes at {:#x}",
        image.file.name, image.file.file_size, image.load_address
    );

    let entry = VirtAddr::new(boot_info.physical_memory_offset + image.load_address);
    unsafe { loader::hand_off(entry) }
}

fn list_root<D: BlockDevice>(disk: &mut D, config: &BootConfig) {
    let mut volume = match Volume::mount(disk, config.fat_selection) {
        Ok(v) => v,
        Err(e) => {
            debug!("root listing skipped: {}", BootError::Fs(e));
            return;
        }
    };
    let mut entries = [FileRecord::EMPTY; 16];
    let root = volume.root_cluster();
    if let Ok(n) = volume.list_directory(root, &mut entries) {
        for e in &entries[..n] {
            debug!(" - {} (cluster {}, size {})", e.name, e.first_cluster, e.file_size);
        }
    }
}

/// This function is called on panic.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    halt(info)
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kloader_os::test_panic_handler(info)
}

#[test_case]
fn trivial_assertion() {
    assert_eq!(1, 1);
}
