use x86_64::instructions::port::Port;

/// Byte and word access to I/O ports.
///
/// The ATA driver only talks to hardware through this trait, so tests can
/// script a device without touching real ports.
pub trait PortIo {
    fn read_u8(&mut self, port: u16) -> u8;
    fn read_u16(&mut self, port: u16) -> u16;
    fn write_u8(&mut self, port: u16, value: u8);
}

/// Real `in`/`out` instructions.
pub struct X86PortIo {
    _private: (),
}

impl X86PortIo {
    /// # Safety
    ///
    /// The caller must own the ports the driver will touch; nothing else may
    /// program the same controller while this value is alive.
    pub const unsafe fn new() -> Self {
        X86PortIo { _private: () }
    }
}

impl PortIo for X86PortIo {
    fn read_u8(&mut self, port: u16) -> u8 {
        unsafe { Port::<u8>::new(port).read() }
    }

    fn read_u16(&mut self, port: u16) -> u16 {
        unsafe { Port::<u16>::new(port).read() }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        unsafe { Port::<u8>::new(port).write(value) }
    }
}
