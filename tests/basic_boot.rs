#![no_std]
#![no_main]
#![feature(custom_test_frameworks)]
#![test_runner(kloader_os::test_runner)]
#![reexport_test_harness_main = "test_main"]

use bootloader::{entry_point, BootInfo};
use core::panic::PanicInfo;
use kloader_os::println;

entry_point!(main);

fn main(_boot_info: &'static BootInfo) -> ! {
    kloader_os::init();
    test_main();
    loop {}
}

#[test_case]
fn test_println() {
    println!("test_println output");
}

#[test_case]
fn logging_is_installed() {
    log::info!("logging from basic_boot");
    assert_eq!(log::max_level(), kloader_os::logging::level_filter());
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    kloader_os::test_panic_handler(info)
}
