use crate::fs::block_device::BlockDevice;
use crate::fs::fat_constants::*;
use crate::fs::fs::FsError;
use crate::fs::sector_buffer::{le_u16, le_u32, SectorBuffer};
use bitflags::bitflags;
use core::fmt;

bitflags! {
    /// Attribute byte of a directory entry.
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// Attribute value reserved for VFAT long-name entries.
pub const ATTR_LONG_NAME: u8 = 0x0F;

/// 8.3 name exactly as stored on disk: 11 bytes, space padded, no dot.
///
/// Comparison is byte for byte; "KERNEL  BIN" never equals "kernel  bin".
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortName([u8; SHORT_NAME_LEN]);

impl ShortName {
    pub const fn new(bytes: [u8; SHORT_NAME_LEN]) -> Self {
        ShortName(bytes)
    }

    /// Accepts only an already padded 11-byte name.
    pub fn parse(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() != SHORT_NAME_LEN {
            return None;
        }
        let mut out = [0u8; SHORT_NAME_LEN];
        out.copy_from_slice(bytes);
        Some(ShortName(out))
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or("<invalid name>")
    }
}

impl PartialEq<&str> for ShortName {
    fn eq(&self, other: &&str) -> bool {
        &self.0[..] == other.as_bytes()
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Owned copy of the fields the loader needs from an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub name: ShortName,
    pub attributes: Attributes,
    pub first_cluster: u32,
    pub file_size: u32,
}

impl FileRecord {
    pub const EMPTY: FileRecord = FileRecord {
        name: ShortName::new([b' '; SHORT_NAME_LEN]),
        attributes: Attributes::empty(),
        first_cluster: 0,
        file_size: 0,
    };
}

/// One 32-byte entry inside a directory sector.
#[derive(Clone, Copy)]
pub struct DirEntry<'a> {
    raw: &'a [u8],
}

impl<'a> DirEntry<'a> {
    pub fn short_name(&self) -> ShortName {
        let mut name = [0u8; SHORT_NAME_LEN];
        name.copy_from_slice(&self.raw[0..SHORT_NAME_LEN]);
        ShortName(name)
    }

    /// Lower-case display flags for the base name and extension.
    pub fn case_flags(&self) -> u8 {
        self.raw[12]
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.raw[11])
    }

    pub fn first_cluster(&self) -> u32 {
        let high = le_u16(self.raw, 20) as u32;
        let low = le_u16(self.raw, 26) as u32;
        (high << 16) | low
    }

    pub fn file_size(&self) -> u32 {
        le_u32(self.raw, 28)
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes().contains(Attributes::READ_ONLY)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes().contains(Attributes::HIDDEN)
    }

    pub fn is_system_file(&self) -> bool {
        self.attributes().contains(Attributes::SYSTEM)
    }

    pub fn is_volume_id(&self) -> bool {
        self.attributes().contains(Attributes::VOLUME_ID)
    }

    pub fn is_directory(&self) -> bool {
        self.attributes().contains(Attributes::DIRECTORY)
    }

    pub fn is_archive(&self) -> bool {
        self.attributes().contains(Attributes::ARCHIVE)
    }

    /// The whole attribute byte is 0x0F, not just those bits.
    pub fn is_long_file_name_entry(&self) -> bool {
        self.raw[11] == ATTR_LONG_NAME
    }

    /// No entries follow this one in the directory.
    pub fn is_end_marker(&self) -> bool {
        self.raw[0] == DIR_ENTRY_END
    }

    pub fn is_free(&self) -> bool {
        self.raw[0] == DIR_ENTRY_FREE
    }

    pub fn record(&self) -> FileRecord {
        FileRecord {
            name: self.short_name(),
            attributes: self.attributes(),
            first_cluster: self.first_cluster(),
            file_size: self.file_size(),
        }
    }
}

/// Iterator over the 16 entries of a directory sector. Works from both ends.
pub struct DirEntries<'a> {
    sector: &'a [u8],
    front: usize,
    back: usize,
}

impl<'a> DirEntries<'a> {
    fn entry(&self, index: usize) -> DirEntry<'a> {
        let start = index * DIR_ENTRY_SIZE;
        DirEntry { raw: &self.sector[start..start + DIR_ENTRY_SIZE] }
    }
}

impl<'a> Iterator for DirEntries<'a> {
    type Item = DirEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let entry = self.entry(self.front);
        self.front += 1;
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<'a> DoubleEndedIterator for DirEntries<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.entry(self.back))
    }
}

impl<'a> ExactSizeIterator for DirEntries<'a> {}

/// A sector of a directory's data, read as 16 entries.
pub struct DirectorySector {
    buf: SectorBuffer<1>,
}

impl DirectorySector {
    pub fn read<D: BlockDevice>(device: &mut D, lba: u32) -> Result<Self, FsError> {
        Ok(DirectorySector { buf: SectorBuffer::load(device, lba)? })
    }

    pub fn from_buffer(buf: SectorBuffer<1>) -> Self {
        DirectorySector { buf }
    }

    pub fn lba(&self) -> u32 {
        self.buf.start_sector()
    }

    pub fn entries(&self) -> DirEntries<'_> {
        DirEntries { sector: self.buf.as_bytes(), front: 0, back: DIR_ENTRIES_PER_SECTOR }
    }

    /// First short-name entry called `name`. Long-name entries are skipped.
    pub fn find(&self, name: &ShortName) -> Option<DirEntry<'_>> {
        self.entries()
            .filter(|e| !e.is_long_file_name_entry())
            .find(|e| e.short_name() == *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_entry(sector: &mut [u8; SECTOR_SIZE], idx: usize, name: &[u8; 11], attr: u8, cluster: u32, size: u32) {
        let e = &mut sector[idx * 32..idx * 32 + 32];
        e[0..11].copy_from_slice(name);
        e[11] = attr;
        e[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        e[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        e[28..32].copy_from_slice(&size.to_le_bytes());
    }

    fn sector() -> DirectorySector {
        let mut raw = [[0u8; SECTOR_SIZE]; 1];
        put_entry(&mut raw[0], 0, b"BOOT       ", 0x08, 0, 0);
        put_entry(&mut raw[0], 1, b"Bk\0e\0r\0n\0e\0", ATTR_LONG_NAME, 0, 0);
        put_entry(&mut raw[0], 2, b"KERNEL  BIN", 0x21, 0x0012_3456, 70_000);
        put_entry(&mut raw[0], 3, b"SYS        ", 0x16, 9, 0);
        put_entry(&mut raw[0], 15, b"LAST    TXT", 0x20, 40, 3);
        DirectorySector::from_buffer(SectorBuffer::from_sectors(100, raw))
    }

    #[test_case]
    fn sixteen_entries_both_directions() {
        let dir = sector();
        assert_eq!(dir.entries().len(), 16);
        assert_eq!(dir.entries().count(), 16);
        let last = dir.entries().next_back().expect("empty iterator");
        assert_eq!(last.short_name(), "LAST    TXT");
        let mut it = dir.entries();
        assert_eq!(it.next().map(|e| e.short_name()), Some(ShortName::new(*b"BOOT       ")));
        assert_eq!(it.next_back().map(|e| e.first_cluster()), Some(40));
        assert_eq!(it.len(), 14);
        assert_eq!(dir.entries().rev().nth(13).map(|e| e.file_size()), Some(70_000));
    }

    #[test_case]
    fn entry_fields() {
        let dir = sector();
        let kernel = dir.entries().nth(2).expect("missing entry");
        assert_eq!(kernel.first_cluster(), 0x0012_3456);
        assert_eq!(kernel.file_size(), 70_000);
        assert!(kernel.is_read_only());
        assert!(kernel.is_archive());
        assert!(!kernel.is_directory());
        assert!(!kernel.is_long_file_name_entry());

        let sys = dir.entries().nth(3).expect("missing entry");
        assert!(sys.is_directory() && sys.is_system_file() && sys.is_hidden());
        assert!(!sys.is_volume_id());

        let lfn = dir.entries().nth(1).expect("missing entry");
        assert!(lfn.is_long_file_name_entry());
        assert!(lfn.is_read_only() && lfn.is_volume_id());

        assert!(dir.entries().nth(4).map(|e| e.is_end_marker()).unwrap_or(false));
    }

    #[test_case]
    fn short_name_comparison_is_exact() {
        let dir = sector();
        let wanted = ShortName::new(*b"KERNEL  BIN");
        assert_eq!(dir.find(&wanted).map(|e| e.first_cluster()), Some(0x0012_3456));
        assert!(ShortName::parse("KERNEL.BIN").is_none());
        let dotted = ShortName::new(*b"KERNEL.BIN ");
        assert!(dir.find(&dotted).is_none());
        let lower = ShortName::new(*b"kernel  bin");
        assert!(dir.find(&lower).is_none());
        assert!(wanted != "KERNEL.BIN");
        assert!(wanted == "KERNEL  BIN");
    }

    #[test_case]
    fn find_skips_long_name_entries() {
        let dir = sector();
        let lfn_name = ShortName::new(*b"Bk\0e\0r\0n\0e\0");
        assert!(dir.find(&lfn_name).is_none());
    }

    #[test_case]
    fn record_copies_fields() {
        let dir = sector();
        let rec = dir.entries().nth(2).map(|e| e.record()).expect("missing entry");
        assert_eq!(rec.name.as_str(), "KERNEL  BIN");
        assert_eq!(rec.attributes, Attributes::READ_ONLY | Attributes::ARCHIVE);
        assert_eq!(rec.first_cluster, 0x0012_3456);
        assert_eq!(dir.lba(), 100);
    }
}
