//! ### NTFS Attribute Framework
//!
//! Everything in an MFT record after the header is an attribute.  Each attribute
//! carries a common header, a residency-specific header, and a typed payload.
//! Rather than a class per type, the common header lives once on `Attribute` and
//! the decoded type-specific fields live in the `Payload` variant keyed by the
//! 4-byte type code.
//!
//! Non-resident attributes locate their content through data runs: a variable
//! width encoding of (cluster count, signed delta) pairs, where each delta is
//! added to a running start cluster.  A run with no offset bytes is a sparse
//! hole; sparse runs are recorded but excluded from the flat cluster list.

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::warn;
use crate::bios::bytes::{u_le,i_le};
use super::index::IndexEntry;
use crate::DYNERR;

pub const STANDARD_INFORMATION: u32 = 0x10;
pub const ATTRIBUTE_LIST: u32 = 0x20;
pub const FILE_NAME: u32 = 0x30;
pub const DATA: u32 = 0x80;
pub const INDEX_ROOT: u32 = 0x90;
pub const INDEX_ALLOCATION: u32 = 0xa0;
pub const BITMAP: u32 = 0xb0;

/// attribute flags
const FLAG_COMPRESSED: u16 = 0x0001;
const FLAG_ENCRYPTED: u16 = 0x4000;
const FLAG_SPARSE: u16 = 0x8000;

/// One extent of a non-resident attribute.  `lcn` is None for a sparse hole.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub struct DataRun {
    pub lcn: Option<u64>,
    pub count: u64
}

impl DataRun {
    /// the run's clusters in order; empty for sparse holes
    pub fn cluster_list(&self) -> Vec<u64> {
        match self.lcn {
            Some(start) => (start..start+self.count).collect(),
            None => Vec::new()
        }
    }
}

/// Decode a data-run stream starting at `offset`, ending at the 0x00 header byte.
/// The header's low nibble counts length bytes, the high nibble counts offset
/// bytes; offsets are signed deltas against the previous run's start.
pub fn decode_runs(buf: &[u8],offset: usize) -> Result<Vec<DataRun>,DYNERR> {
    let mut ans: Vec<DataRun> = Vec::new();
    let mut pos = offset;
    let mut start: i64 = 0;
    while pos < buf.len() {
        let head = buf[pos];
        if head==0 {
            return Ok(ans);
        }
        let count_len = (head & 0x0f) as usize;
        let offset_len = (head >> 4) as usize;
        pos += 1;
        if count_len==0 || count_len > 8 || offset_len > 8 || pos + count_len + offset_len > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let count = u_le(buf,pos,count_len);
        pos += count_len;
        match offset_len {
            0 => ans.push(DataRun { lcn: None, count }),
            _ => {
                start += i_le(buf,pos,offset_len);
                pos += offset_len;
                if start < 0 {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                ans.push(DataRun { lcn: Some(start as u64), count });
            }
        }
    }
    // ran off the end without a terminator
    Err(Box::new(crate::fs::Error::Corrupt))
}

/// Residency-specific half of the attribute header.
pub enum Residency {
    Resident {
        attr_length: u32,
        attr_offset: u16,
        indexed: bool
    },
    NonResident {
        first_vcn: u64,
        last_vcn: u64,
        compression_unit: u16,
        physical_size: u64,
        logical_size: u64,
        initialized_size: u64,
        runs: Vec<DataRun>
    }
}

/// $10 STANDARD_INFORMATION: four FILETIMEs and the DOS flags.
pub struct StandardInfo {
    created: u64,
    modified: u64,
    record_changed: u64,
    accessed: u64,
    flags: u32
}

impl StandardInfo {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 36 {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        Ok(Self {
            created: u_le(buf,0,8),
            modified: u_le(buf,8,8),
            record_changed: u_le(buf,16,8),
            accessed: u_le(buf,24,8),
            flags: u_le(buf,32,4) as u32
        })
    }
    pub fn raw_created(&self) -> u64 {
        self.created
    }
    pub fn raw_modified(&self) -> u64 {
        self.modified
    }
    pub fn raw_record_changed(&self) -> u64 {
        self.record_changed
    }
    pub fn raw_accessed(&self) -> u64 {
        self.accessed
    }
    pub fn created(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.created)
    }
    pub fn modified(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.modified)
    }
    pub fn record_changed(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.record_changed)
    }
    pub fn accessed(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.accessed)
    }
    pub fn flags(&self) -> u32 {
        self.flags
    }
    pub fn is_read_only(&self) -> bool {
        self.flags & 0x01 != 0
    }
    pub fn is_hidden(&self) -> bool {
        self.flags & 0x02 != 0
    }
    pub fn is_system(&self) -> bool {
        self.flags & 0x04 != 0
    }
    pub fn is_archive(&self) -> bool {
        self.flags & 0x20 != 0
    }
    pub fn is_compressed(&self) -> bool {
        self.flags & 0x800 != 0
    }
    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x4000 != 0
    }
}

/// $30 FILE_NAME: parent reference, FILETIMEs, sizes, and the UTF-16 name.
/// The same layout serves as the key inside index entries.
pub struct FileNameAttr {
    parent_ref: u64,
    created: u64,
    modified: u64,
    record_changed: u64,
    accessed: u64,
    physical_size: u64,
    logical_size: u64,
    flags: u32,
    extended_flags: u32,
    name_len: u8,
    namespace: u8,
    name: String
}

impl FileNameAttr {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 66 {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let name_len = buf[64];
        if 66 + 2*name_len as usize > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let mut units: Vec<u16> = Vec::new();
        for i in 0..name_len as usize {
            units.push(u16::from_le_bytes([buf[66+2*i],buf[67+2*i]]));
        }
        Ok(Self {
            parent_ref: u_le(buf,0,8),
            created: u_le(buf,8,8),
            modified: u_le(buf,16,8),
            record_changed: u_le(buf,24,8),
            accessed: u_le(buf,32,8),
            physical_size: u_le(buf,40,8),
            logical_size: u_le(buf,48,8),
            flags: u_le(buf,56,4) as u32,
            extended_flags: u_le(buf,60,4) as u32,
            name_len,
            namespace: buf[65],
            name: String::from_utf16_lossy(&units)
        })
    }
    /// 48-bit MFT number of the parent directory
    pub fn parent_mft(&self) -> u64 {
        self.parent_ref & 0x0000_ffff_ffff_ffff
    }
    pub fn parent_seq(&self) -> u16 {
        (self.parent_ref >> 48) as u16
    }
    pub fn created(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.created)
    }
    pub fn modified(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.modified)
    }
    pub fn record_changed(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.record_changed)
    }
    pub fn accessed(&self) -> chrono::DateTime<chrono::Utc> {
        super::filetime_to_datetime(self.accessed)
    }
    pub fn physical_size(&self) -> u64 {
        self.physical_size
    }
    pub fn logical_size(&self) -> u64 {
        self.logical_size
    }
    pub fn flags(&self) -> u32 {
        self.flags
    }
    pub fn is_directory(&self) -> bool {
        self.flags & 0x1000_0000 != 0
    }
    pub fn is_index_view(&self) -> bool {
        self.flags & 0x2000_0000 != 0
    }
    pub fn extended_flags(&self) -> u32 {
        self.extended_flags
    }
    /// count of UTF-16 code units in the name
    pub fn name_len(&self) -> u8 {
        self.name_len
    }
    pub fn namespace(&self) -> u8 {
        self.namespace
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One item of a $20 ATTRIBUTE_LIST: names the record holding one slice of
/// an external attribute.
pub struct AttrListItem {
    pub type_code: u32,
    pub record_length: u16,
    pub start_vcn: u64,
    mft_ref: u64,
    pub attr_id: u16,
    pub name: Option<String>
}

impl AttrListItem {
    /// 48-bit MFT number of the record holding the attribute slice
    pub fn mft(&self) -> u64 {
        self.mft_ref & 0x0000_ffff_ffff_ffff
    }
    pub fn sequence_number(&self) -> u16 {
        (self.mft_ref >> 48) as u16
    }
}

fn decode_attr_list(buf: &[u8]) -> Result<Vec<AttrListItem>,DYNERR> {
    let mut ans: Vec<AttrListItem> = Vec::new();
    let mut pos = 0;
    while pos + 26 <= buf.len() {
        let record_length = u_le(buf,pos+4,2) as u16;
        if record_length < 26 || pos + record_length as usize > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let name_len = buf[pos+6] as usize;
        let name_ofs = buf[pos+7] as usize;
        let name = match name_len {
            0 => None,
            _ => {
                if pos + name_ofs + 2*name_len > buf.len() {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                let mut units: Vec<u16> = Vec::new();
                for i in 0..name_len {
                    units.push(u16::from_le_bytes([buf[pos+name_ofs+2*i],buf[pos+name_ofs+2*i+1]]));
                }
                Some(String::from_utf16_lossy(&units))
            }
        };
        ans.push(AttrListItem {
            type_code: u_le(buf,pos,4) as u32,
            record_length,
            start_vcn: u_le(buf,pos+8,8),
            mft_ref: u_le(buf,pos+16,8),
            attr_id: u_le(buf,pos+24,2) as u16,
            name
        });
        pos += record_length as usize;
    }
    Ok(ans)
}

/// $90 INDEX_ROOT: index parameters plus the resident index entries.
/// Entries are only collected when the indexed attribute is $30 (a directory's
/// filename index); other indexes are acknowledged but not walked.
pub struct IndexRoot {
    pub indexed_type: u32,
    pub collation_rule: u32,
    pub buffer_size: u32,
    pub clusters_per_buffer: u32,
    pub offset_to_entries: u32,
    pub logical_size: u32,
    pub physical_size: u32,
    pub node_flags: u32,
    pub entries: Vec<IndexEntry>
}

impl IndexRoot {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 32 {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let indexed_type = u_le(buf,0,4) as u32;
        let offset_to_entries = u_le(buf,16,4) as u32;
        let logical_size = u_le(buf,20,4) as u32;
        let mut ans = Self {
            indexed_type,
            collation_rule: u_le(buf,4,4) as u32,
            buffer_size: u_le(buf,8,4) as u32,
            clusters_per_buffer: u_le(buf,12,4) as u32,
            offset_to_entries,
            logical_size,
            physical_size: u_le(buf,24,4) as u32,
            node_flags: u_le(buf,28,4) as u32,
            entries: Vec::new()
        };
        if indexed_type != FILE_NAME {
            return Ok(ans);
        }
        // entry offsets are relative to the node header at byte 16
        let mut pos = 16 + offset_to_entries as usize;
        let end = std::cmp::min(16 + logical_size as usize,buf.len());
        while pos + 16 <= end {
            let entry = IndexEntry::from_bytes(buf,pos)?;
            let last = entry.is_last();
            pos += entry.total_length as usize;
            ans.entries.push(entry);
            if last {
                break;
            }
        }
        Ok(ans)
    }
    pub fn is_large_index(&self) -> bool {
        self.node_flags & 0x01 != 0
    }
}

/// $B0 BITMAP: a bit per index buffer, low bit of each byte first.
pub struct Bitmap {
    bits: Vec<u8>
}

impl Bitmap {
    pub fn new(bits: Vec<u8>) -> Self {
        Self { bits }
    }
    pub fn in_use(&self,idx: u64) -> bool {
        let byte = (idx >> 3) as usize;
        if byte >= self.bits.len() {
            return false;
        }
        (self.bits[byte] >> (idx & 7)) & 1 != 0
    }
    pub fn buffers_in_map(&self) -> u64 {
        8 * self.bits.len() as u64
    }
    pub fn buffers_in_use(&self) -> u64 {
        let mut ans = 0;
        for i in 0..self.buffers_in_map() {
            if self.in_use(i) {
                ans += 1;
            }
        }
        ans
    }
}

/// Decoded type-specific content of an attribute.
pub enum Payload {
    StandardInfo(StandardInfo),
    AttributeList(Vec<AttrListItem>),
    FileName(FileNameAttr),
    /// resident payload bytes, or None when the content lives in data runs
    Data(Option<Vec<u8>>),
    IndexRoot(IndexRoot),
    IndexAllocation,
    Bitmap(Bitmap),
    Other
}

/// Common attribute header carrying a typed payload.
#[derive(BinRead,Debug)]
#[br(little)]
struct CommonHeader {
    type_code: u32,
    total_length: u32,
    non_resident: u8,
    name_len: u8,
    name_offset: u16,
    flags: u16,
    id: u16
}

pub struct Attribute {
    type_code: u32,
    total_length: u32,
    flags: u16,
    id: u16,
    name: Option<String>,
    pub residency: Residency,
    pub payload: Payload
}

impl Attribute {
    /// Decode the attribute at `offset` of a fixed-up record buffer.
    pub fn parse(buf: &[u8],offset: usize) -> Result<Self,DYNERR> {
        if offset + 24 > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let mut curs = Cursor::new(&buf[offset..offset+16]);
        let common: CommonHeader = curs.read_le()?;
        let total = common.total_length as usize;
        if total < 24 || offset + total > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let name = match common.name_len {
            0 => None,
            n => {
                let beg = offset + common.name_offset as usize;
                if beg + 2*n as usize > offset + total {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                let mut units: Vec<u16> = Vec::new();
                for i in 0..n as usize {
                    units.push(u16::from_le_bytes([buf[beg+2*i],buf[beg+2*i+1]]));
                }
                Some(String::from_utf16_lossy(&units))
            }
        };
        let residency = match common.non_resident {
            0 => {
                let attr_length = u_le(buf,offset+16,4) as u32;
                let attr_offset = u_le(buf,offset+20,2) as u16;
                if offset + attr_offset as usize + attr_length as usize > offset + total {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                Residency::Resident {
                    attr_length,
                    attr_offset,
                    indexed: buf[offset+22]==0x01
                }
            },
            _ => {
                if offset + 64 > buf.len() {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                let run_offset = u_le(buf,offset+32,2) as usize;
                if run_offset < 64 || run_offset >= total {
                    return Err(Box::new(crate::fs::Error::Corrupt));
                }
                let runs = decode_runs(&buf[..offset+total],offset+run_offset)?;
                Residency::NonResident {
                    first_vcn: u_le(buf,offset+16,8),
                    last_vcn: u_le(buf,offset+24,8),
                    compression_unit: u_le(buf,offset+34,2) as u16,
                    physical_size: u_le(buf,offset+40,8),
                    logical_size: u_le(buf,offset+48,8),
                    initialized_size: u_le(buf,offset+56,8),
                    runs
                }
            }
        };
        let payload = Self::decode_payload(buf,offset,common.type_code,&residency)?;
        Ok(Self {
            type_code: common.type_code,
            total_length: common.total_length,
            flags: common.flags,
            id: common.id,
            name,
            residency,
            payload
        })
    }
    fn resident_slice<'a>(buf: &'a [u8],offset: usize,residency: &Residency) -> Option<&'a [u8]> {
        match residency {
            Residency::Resident { attr_length, attr_offset, .. } => {
                let beg = offset + *attr_offset as usize;
                Some(&buf[beg..beg + *attr_length as usize])
            },
            Residency::NonResident { .. } => None
        }
    }
    fn decode_payload(buf: &[u8],offset: usize,type_code: u32,residency: &Residency) -> Result<Payload,DYNERR> {
        match (type_code,Self::resident_slice(buf,offset,residency)) {
            (STANDARD_INFORMATION,Some(slice)) => Ok(Payload::StandardInfo(StandardInfo::from_bytes(slice)?)),
            (ATTRIBUTE_LIST,Some(slice)) => Ok(Payload::AttributeList(decode_attr_list(slice)?)),
            (FILE_NAME,Some(slice)) => Ok(Payload::FileName(FileNameAttr::from_bytes(slice)?)),
            (DATA,Some(slice)) => Ok(Payload::Data(Some(slice.to_vec()))),
            (DATA,None) => Ok(Payload::Data(None)),
            (INDEX_ROOT,Some(slice)) => Ok(Payload::IndexRoot(IndexRoot::from_bytes(slice)?)),
            (INDEX_ALLOCATION,None) => Ok(Payload::IndexAllocation),
            (BITMAP,Some(slice)) => Ok(Payload::Bitmap(Bitmap::new(slice.to_vec()))),
            (ATTRIBUTE_LIST,None) => {
                // a non-resident $20 is legal but rare; we do not chase it
                warn!("non-resident attribute list is not supported");
                Err(Box::new(crate::fs::Error::Unsupported))
            },
            _ => Ok(Payload::Other)
        }
    }
    pub fn type_code(&self) -> u32 {
        self.type_code
    }
    pub fn total_length(&self) -> u32 {
        self.total_length
    }
    pub fn flags(&self) -> u16 {
        self.flags
    }
    pub fn id(&self) -> u16 {
        self.id
    }
    pub fn is_resident(&self) -> bool {
        matches!(self.residency,Residency::Resident { .. })
    }
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
    pub fn is_sparse(&self) -> bool {
        self.flags & FLAG_SPARSE != 0
    }
    pub fn first_vcn(&self) -> Option<u64> {
        match &self.residency {
            Residency::NonResident { first_vcn, .. } => Some(*first_vcn),
            _ => None
        }
    }
    pub fn last_vcn(&self) -> Option<u64> {
        match &self.residency {
            Residency::NonResident { last_vcn, .. } => Some(*last_vcn),
            _ => None
        }
    }
    pub fn runs(&self) -> Option<&[DataRun]> {
        match &self.residency {
            Residency::NonResident { runs, .. } => Some(runs),
            _ => None
        }
    }
    /// Flat list of LCNs in VCN order.  Sparse holes are excluded, so the list
    /// only maps the contiguous materialized ranges.
    pub fn cluster_list(&self) -> Vec<u64> {
        match &self.residency {
            Residency::NonResident { runs, .. } => {
                let mut ans: Vec<u64> = Vec::new();
                for run in runs {
                    ans.append(&mut run.cluster_list());
                }
                ans
            },
            _ => Vec::new()
        }
    }
    /// resident payload bytes of a $80 DATA attribute
    pub fn resident_data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Data(Some(bytes)) => Some(bytes),
            _ => None
        }
    }
    /// Same, but asking a non-resident attribute for its inline payload is a
    /// caller error and says so.
    pub fn resident_payload(&self) -> Result<&[u8],DYNERR> {
        match &self.payload {
            Payload::Data(Some(bytes)) => Ok(bytes),
            _ => Err(Box::new(crate::fs::Error::NotApplicable))
        }
    }
}
