//! ### FAT Directory Structures
//!
//! This module decodes the FAT directory.  The FAT itself is implemented in
//! `crate::bios::fat` and the BPB in `crate::bios::bpb`.
//!
//! A directory is a packed sequence of 32-byte entries.  A file with a long (VFAT)
//! name occupies several physical entries: the long-name fragments in reverse
//! logical order, then the short entry that owns the metadata.  `FileEntry` is the
//! grouping of 1..N raw entries that belong to one file.  A deleted entry always
//! stands alone, even if it originally belonged to a long-name cluster; that way a
//! partially reused group never poisons its neighbors.

use chrono::{NaiveDate,NaiveTime};
use log::warn;
use super::pack;

/// Size of a directory entry in bytes, always 32
pub const DIR_ENTRY_SIZE: usize = 32;
/// first name byte for a deleted entry
pub const DELETED: u8 = 0xe5;
/// first name byte indicating no more entries follow
pub const FREE_AND_NO_MORE: u8 = 0x00;

pub const READ_ONLY: u8 = 1;
pub const HIDDEN: u8 = 2;
pub const SYSTEM: u8 = 4;
pub const VOLUME_ID: u8 = 8;
pub const DIRECTORY: u8 = 16;
pub const ARCHIVE: u8 = 32;
pub const LONG_NAME: u8 = 15;

/// the sequence number's low 5 bits are the 1-based LFN index
const LFN_SEQ_MASK: u8 = 0x1f;
/// bit 6 marks the last physical LFN entry, which is the logical first
const LFN_LAST: u8 = 0x40;

/// Short 8.3 entry with all the metadata
#[derive(Clone)]
pub struct ShortEntry {
    deleted: bool,
    name: [u8;8],
    ext: [u8;3],
    attr: u8,
    tenths: u8,
    create_time: [u8;2],
    create_date: [u8;2],
    access_date: [u8;2],
    cluster_hi: [u8;2],
    write_time: [u8;2],
    write_date: [u8;2],
    cluster_lo: [u8;2],
    file_size: [u8;4]
}

/// Long filename fragment: 5+6+2 UCS-2 code units spread over the 32 bytes
#[derive(Clone)]
pub struct LongEntry {
    deleted: bool,
    sequence: u8,
    checksum: u8,
    fragment: String
}

/// One raw 32-byte directory entry, either a short entry or an LFN fragment
#[derive(Clone)]
pub enum DirEntry {
    Short(ShortEntry),
    Long(LongEntry)
}

impl ShortEntry {
    fn from_bytes(buf: &[u8]) -> Self {
        let mut name: [u8;8] = [0;8];
        name.copy_from_slice(&buf[0..8]);
        let mut ext: [u8;3] = [0;3];
        ext.copy_from_slice(&buf[8..11]);
        Self {
            deleted: buf[0]==DELETED,
            name,
            ext,
            attr: buf[11],
            tenths: buf[13],
            create_time: [buf[14],buf[15]],
            create_date: [buf[16],buf[17]],
            access_date: [buf[18],buf[19]],
            cluster_hi: [buf[20],buf[21]],
            write_time: [buf[22],buf[23]],
            write_date: [buf[24],buf[25]],
            cluster_lo: [buf[26],buf[27]],
            file_size: [buf[28],buf[29],buf[30],buf[31]]
        }
    }
    pub fn name(&self) -> String {
        pack::short_name_to_string(self.name,self.ext,self.deleted)
    }
    pub fn attributes(&self) -> u8 {
        self.attr
    }
    /// FAT32 keeps the start cluster's high word at offset 20
    pub fn start_cluster(&self) -> u64 {
        65536 * u16::from_le_bytes(self.cluster_hi) as u64 + u16::from_le_bytes(self.cluster_lo) as u64
    }
    pub fn file_size(&self) -> u64 {
        u32::from_le_bytes(self.file_size) as u64
    }
    pub fn create_date(&self) -> Option<NaiveDate> {
        pack::unpack_date(self.create_date)
    }
    pub fn create_time(&self) -> Option<NaiveTime> {
        pack::unpack_time(self.create_time,self.tenths)
    }
    pub fn access_date(&self) -> Option<NaiveDate> {
        pack::unpack_date(self.access_date)
    }
    pub fn modify_date(&self) -> Option<NaiveDate> {
        pack::unpack_date(self.write_date)
    }
    pub fn modify_time(&self) -> Option<NaiveTime> {
        pack::unpack_time(self.write_time,0)
    }
}

impl LongEntry {
    fn from_bytes(buf: &[u8]) -> Self {
        // name fragments live at 1..11, 14..26, 28..32
        let mut units: Vec<u16> = Vec::new();
        let ranges = [(1usize,11usize),(14,26),(28,32)];
        'outer: for (beg,end) in ranges {
            let mut i = beg;
            while i < end {
                let unit = u16::from_le_bytes([buf[i],buf[i+1]]);
                // stop at UCS-2 NUL or 0xFFFF padding
                if unit==0 || unit==0xffff {
                    break 'outer;
                }
                units.push(unit);
                i += 2;
            }
        }
        Self {
            deleted: buf[0]==DELETED,
            sequence: buf[0],
            checksum: buf[13],
            fragment: String::from_utf16_lossy(&units)
        }
    }
    /// 1-based position of this fragment in the logical name
    pub fn sequence_number(&self) -> u8 {
        self.sequence & LFN_SEQ_MASK
    }
    /// marks the last physical entry, which holds the end of the name
    pub fn is_last(&self) -> bool {
        self.sequence & LFN_LAST != 0
    }
    pub fn checksum(&self) -> u8 {
        self.checksum
    }
    pub fn fragment(&self) -> &str {
        &self.fragment
    }
}

impl DirEntry {
    /// Decode 32 bytes.  An attribute byte of 0x0F with a zero type byte marks
    /// a long filename fragment.
    pub fn from_bytes(buf: &[u8]) -> Self {
        if buf[11]==LONG_NAME && buf[12]==0 {
            Self::Long(LongEntry::from_bytes(buf))
        } else {
            Self::Short(ShortEntry::from_bytes(buf))
        }
    }
    pub fn is_long(&self) -> bool {
        matches!(self,Self::Long(_))
    }
    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Short(e) => e.deleted,
            Self::Long(e) => e.deleted
        }
    }
}

/// Ordered collection of the raw entries belonging to one file: zero or more
/// long-name fragments followed by the short entry.  Deleted entries always
/// come through as single-entry groups.
pub struct FileEntry {
    entries: Vec<DirEntry>
}

impl FileEntry {
    /// Group raw entries starting at `offset` in the directory buffer.
    /// If the first entry is a live LFN fragment the scan continues until the
    /// short entry is found.  Returns an empty group at a terminator.
    pub fn parse(buffer: &[u8],offset: usize) -> Self {
        let mut entries: Vec<DirEntry> = Vec::new();
        if offset + DIR_ENTRY_SIZE > buffer.len() || buffer[offset]==FREE_AND_NO_MORE {
            return Self { entries };
        }
        let first = DirEntry::from_bytes(&buffer[offset..offset+DIR_ENTRY_SIZE]);
        if first.is_deleted() {
            entries.push(first);
            return Self { entries };
        }
        if first.is_long() {
            let mut curr = first;
            let mut oset = offset + DIR_ENTRY_SIZE;
            while curr.is_long() {
                entries.push(curr);
                if oset + DIR_ENTRY_SIZE > buffer.len() || buffer[oset]==FREE_AND_NO_MORE {
                    warn!("long name group ran into the directory terminator");
                    return Self { entries };
                }
                curr = DirEntry::from_bytes(&buffer[oset..oset+DIR_ENTRY_SIZE]);
                oset += DIR_ENTRY_SIZE;
            }
            entries.push(curr);
        } else {
            entries.push(first);
        }
        Self { entries }
    }
    /// number of raw entries in the group
    pub fn entries(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn is_deleted(&self) -> bool {
        match self.entries.first() {
            Some(e) => e.is_deleted(),
            None => false
        }
    }
    pub fn has_long_filename(&self) -> bool {
        match self.entries.first() {
            Some(e) => e.is_long(),
            None => false
        }
    }
    pub fn has_short_filename(&self) -> bool {
        match self.entries.last() {
            Some(e) => !e.is_long(),
            None => false
        }
    }
    fn short(&self) -> Option<&ShortEntry> {
        match self.entries.last() {
            Some(DirEntry::Short(e)) => Some(e),
            _ => None
        }
    }
    /// Reassemble the long name by ascending sequence number, which is the
    /// reverse of physical order.  A lone deleted fragment yields its own piece.
    pub fn long_filename(&self) -> Option<String> {
        if !self.has_long_filename() {
            return None;
        }
        if self.entries.len()==1 {
            if let Some(DirEntry::Long(e)) = self.entries.first() {
                return Some(e.fragment().to_string());
            }
        }
        let mut ans = String::new();
        for i in (0..self.entries.len()-1).rev() {
            if let DirEntry::Long(e) = &self.entries[i] {
                ans += e.fragment();
            }
        }
        Some(ans)
    }
    pub fn short_filename(&self) -> Option<String> {
        self.short().map(|e| e.name())
    }
    /// the best available name for display
    pub fn filename(&self) -> Option<String> {
        match self.long_filename() {
            Some(name) => Some(name),
            None => self.short_filename()
        }
    }
    pub fn attributes(&self) -> Option<u8> {
        self.short().map(|e| e.attributes())
    }
    fn test_attr(&self,mask: u8) -> bool {
        match self.attributes() {
            Some(attr) => attr & mask != 0,
            None => false
        }
    }
    pub fn read_only(&self) -> bool {
        self.test_attr(READ_ONLY)
    }
    pub fn hidden(&self) -> bool {
        self.test_attr(HIDDEN)
    }
    pub fn system(&self) -> bool {
        self.test_attr(SYSTEM)
    }
    pub fn volume_label(&self) -> bool {
        self.test_attr(VOLUME_ID)
    }
    pub fn directory(&self) -> bool {
        self.test_attr(DIRECTORY)
    }
    pub fn archive(&self) -> bool {
        self.test_attr(ARCHIVE)
    }
    pub fn start_cluster(&self) -> Option<u64> {
        self.short().map(|e| e.start_cluster())
    }
    pub fn file_size(&self) -> Option<u64> {
        self.short().map(|e| e.file_size())
    }
    pub fn create_date(&self) -> Option<NaiveDate> {
        self.short().and_then(|e| e.create_date())
    }
    pub fn create_time(&self) -> Option<NaiveTime> {
        self.short().and_then(|e| e.create_time())
    }
    pub fn access_date(&self) -> Option<NaiveDate> {
        self.short().and_then(|e| e.access_date())
    }
    pub fn modify_date(&self) -> Option<NaiveDate> {
        self.short().and_then(|e| e.modify_date())
    }
    pub fn modify_time(&self) -> Option<NaiveTime> {
        self.short().and_then(|e| e.modify_time())
    }
}

/// A directory as a collection of `FileEntry` groups, created from the
/// concatenation of all its clusters.
pub struct Directory {
    files: Vec<FileEntry>
}

impl Directory {
    /// Walk the buffer in 32-byte steps until the terminator or the end.
    pub fn from_bytes(buffer: &[u8]) -> Self {
        let mut files: Vec<FileEntry> = Vec::new();
        let mut offset = 0;
        while offset + DIR_ENTRY_SIZE <= buffer.len() {
            if buffer[offset]==FREE_AND_NO_MORE {
                break;
            }
            let fe = FileEntry::parse(buffer,offset);
            if fe.is_empty() {
                break;
            }
            offset += DIR_ENTRY_SIZE * fe.entries();
            files.push(fe);
        }
        Self { files }
    }
    pub fn entries(&self) -> usize {
        self.files.len()
    }
    pub fn entry(&self,idx: usize) -> Option<&FileEntry> {
        self.files.get(idx)
    }
    pub fn iter(&self) -> std::slice::Iter<'_,FileEntry> {
        self.files.iter()
    }
    /// the volume label entry, if this is a root directory carrying one
    pub fn find_label(&self) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.volume_label() && !f.is_deleted())
    }
    /// deleted groups only, in physical order
    pub fn deleted_entries(&self) -> Vec<&FileEntry> {
        self.files.iter().filter(|f| f.is_deleted()).collect()
    }
}
