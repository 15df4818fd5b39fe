//! ### GPT Scanner
//!
//! The GUID Partition Table lives behind a protective MBR.  The header is at LBA 1
//! and must begin with `"EFI PART"`; the partition array is 128 entries of 128 bytes
//! starting at LBA 2.  An entry with a zero type GUID is empty.
//!
//! Not every type GUID is worth handing to the mount collaborator, so a policy list
//! of supported types marks the partitions a host can reasonably loop-mount.

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::debug;
use crate::bios::bytes::Guid;
use crate::img::Image;
use super::{Error,PartitionRef};
use crate::DYNERR;

const GPT_SIGNATURE: &[u8;8] = b"EFI PART";
const ENTRY_COUNT: usize = 128;
const ENTRY_SIZE: usize = 128;

/// Type GUIDs the mount collaborator should attempt: basic data, the common
/// Linux/BSD/Solaris file systems, HFS+, APFS, UFS, and ZFS.
pub const SUPPORTED_TYPE_GUIDS: [&str;41] = [
    "EBD0A0A2-B9E5-4433-87C0-68B6B72699C7",
    "37AFFC90-EF7D-4E96-91C3-2D7AE055B174",
    "0FC63DAF-8483-4772-8E79-3D69D8477DE4",
    "8DA63339-0007-60C0-C436-083AC8230908",
    "933AC7E1-2EB4-4F13-B844-0E14E2AEF915",
    "44479540-F297-41B2-9AF7-D131D5F0458A",
    "4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709",
    "B921B045-1DF0-41C3-AF44-4C6F280D3FAE",
    "3B8F8425-20E0-4F3B-907F-1A25A76F98E8",
    "E6D6D379-F507-44C2-A23C-238F2A3DF928",
    "516E7CB4-6ECF-11D6-8FF8-00022D09712B",
    "83BD6B9D-7F41-11DC-BE0B-001560B84F0F",
    "516E7CB5-6ECF-11D6-8FF8-00022D09712B",
    "85D5E45A-237C-11E1-B4B3-E89A8F7FC3A7",
    "824CC7A0-36A8-11E3-890A-952519AD3F61",
    "55465300-0000-11AA-AA11-00306543ECAC",
    "49F48D5A-B10E-11DC-B99B-0019D1879648",
    "49F48D82-B10E-11DC-B99B-0019D1879648",
    "2DB519C4-B10F-11DC-B99B-0019D1879648",
    "2DB519EC-B10F-11DC-B99B-0019D1879648",
    "49F48DAA-B10E-11DC-B99B-0019D1879648",
    "426F6F74-0000-11AA-AA11-00306543ECAC",
    "48465300-0000-11AA-AA11-00306543ECAC",
    "52414944-0000-11AA-AA11-00306543ECAC",
    "52414944-5F4F-11AA-AA11-00306543ECAC",
    "4C616265-6C00-11AA-AA11-00306543ECAC",
    "6A82CB45-1DD2-11B2-99A6-080020736631",
    "6A85CF4D-1DD2-11B2-99A6-080020736631",
    "6A898CC3-1DD2-11B2-99A6-080020736631",
    "6A8B642B-1DD2-11B2-99A6-080020736631",
    "6A8EF2E9-1DD2-11B2-99A6-080020736631",
    "6A90BA39-1DD2-11B2-99A6-080020736631",
    "6A9283A5-1DD2-11B2-99A6-080020736631",
    "75894C1E-3AEB-11D3-B7C1-7B03A0000000",
    "E2A1E728-32E3-11D6-A682-7B03A0000000",
    "BC13C2FF-59E6-4262-A352-B275FD6F7172",
    "42465331-3BA3-10F1-802A-4861696B7521",
    "AA31E02A-400F-11DB-9590-000C2911D1B8",
    "9198EFFC-31C0-11DB-8F78-000C2911D1B8",
    "9D275380-40AD-11DB-BF97-000C2911D1B8",
    "A19D880F-05FC-4D3B-A006-743F0F84911E"
];

pub fn is_supported(guid: &Guid) -> bool {
    let s = guid.to_string();
    SUPPORTED_TYPE_GUIDS.contains(&s.as_str())
}

/// GPT header fields following the 8-byte signature
#[derive(BinRead,Debug)]
#[br(little)]
pub struct GptHeader {
    revision: u32,
    header_size: u32,
    header_crc: u32,
    reserved: u32,
    current_lba: u64,
    backup_lba: u64,
    first_usable: u64,
    last_usable: u64,
    disk_guid: [u8;16],
    table_lba: u64,
    num_entries: u32,
    entry_size: u32,
    table_crc: u32
}

impl GptHeader {
    /// Decode the header sector, requiring the `"EFI PART"` signature.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 92 {
            return Err(Box::new(Error::TruncatedSector));
        }
        if &buf[0..8] != GPT_SIGNATURE {
            return Err(Box::new(Error::MissingGptHeader));
        }
        let mut curs = Cursor::new(&buf[8..92]);
        Ok(curs.read_le::<GptHeader>()?)
    }
    pub fn revision(&self) -> u32 {
        self.revision
    }
    pub fn header_size(&self) -> u32 {
        self.header_size
    }
    pub fn current_lba(&self) -> u64 {
        self.current_lba
    }
    pub fn backup_lba(&self) -> u64 {
        self.backup_lba
    }
    pub fn first_usable(&self) -> u64 {
        self.first_usable
    }
    pub fn last_usable(&self) -> u64 {
        self.last_usable
    }
    pub fn disk_guid(&self) -> Guid {
        Guid::new(self.disk_guid)
    }
    pub fn table_lba(&self) -> u64 {
        self.table_lba
    }
    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }
    pub fn entry_size(&self) -> u32 {
        self.entry_size
    }
}

/// One 128-byte partition array entry
#[derive(BinRead,Debug)]
#[br(little)]
pub struct GptEntry {
    type_guid: [u8;16],
    unique_guid: [u8;16],
    first_lba: u64,
    last_lba: u64,
    attributes: u64,
    name_utf16: [u8;72]
}

impl GptEntry {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < ENTRY_SIZE {
            return Err(Box::new(Error::TruncatedSector));
        }
        let mut curs = Cursor::new(&buf[0..ENTRY_SIZE]);
        Ok(curs.read_le::<GptEntry>()?)
    }
    pub fn is_empty(&self) -> bool {
        self.type_guid==[0;16]
    }
    pub fn type_guid(&self) -> Guid {
        Guid::new(self.type_guid)
    }
    pub fn unique_guid(&self) -> Guid {
        Guid::new(self.unique_guid)
    }
    pub fn first_lba(&self) -> u64 {
        self.first_lba
    }
    /// inclusive
    pub fn last_lba(&self) -> u64 {
        self.last_lba
    }
    pub fn attributes(&self) -> u64 {
        self.attributes
    }
    /// UTF-16LE, terminated at the first NUL code unit
    pub fn name(&self) -> String {
        let mut units: Vec<u16> = Vec::new();
        for i in 0..36 {
            let unit = u16::from_le_bytes([self.name_utf16[2*i],self.name_utf16[2*i+1]]);
            if unit==0 {
                break;
            }
            units.push(unit);
        }
        String::from_utf16_lossy(&units)
    }
}

/// Read the header at LBA 1, sanity check it, and emit every non-empty
/// entry from the 16 KiB array at LBA 2.
pub fn scan(img: &mut dyn Image) -> Result<Vec<PartitionRef>,DYNERR> {
    let header_sec = img.read_sectors(1,1)?;
    let header = GptHeader::from_bytes(&header_sec)?;
    debug!("GPT disk {} with {} entries",header.disk_guid(),header.num_entries());
    let table = img.read_sectors(2,32)?;
    let mut ans: Vec<PartitionRef> = Vec::new();
    for i in 0..ENTRY_COUNT {
        let entry = GptEntry::from_bytes(&table[i*ENTRY_SIZE..(i+1)*ENTRY_SIZE])?;
        if entry.is_empty() {
            continue;
        }
        ans.push(PartitionRef::from_gpt(i,&entry));
    }
    Ok(ans)
}

/// Convenience for callers that want the header for display purposes.
pub fn read_header(img: &mut dyn Image) -> Result<GptHeader,DYNERR> {
    let header_sec = img.read_sectors(1,1)?;
    GptHeader::from_bytes(&header_sec)
}
