//! ### MFT Records
//!
//! Every file on an NTFS volume is described by a Master File Table record,
//! 1024 bytes in the usual case.  The record header is followed by the update
//! sequence array and then a stream of attributes terminated by 0xFFFFFFFF.
//!
//! NTFS protects records against torn writes with the fixup protocol: the last
//! two bytes of each 512-byte sector are swapped out for a sentinel before the
//! record is written, and the displaced bytes are stored in the update sequence
//! array.  Reading a record means verifying the sentinels and putting the
//! original bytes back.  The same protocol covers INDX buffers, so the routine
//! is shared.

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::warn;
use super::attr::Attribute;
use crate::DYNERR;

const FILE_SIGNATURE: &[u8;4] = b"FILE";
/// attribute type code that terminates the attribute stream
pub const END_MARKER: u32 = 0xffffffff;

/// flag bit 0: record is in use
pub const IN_USE: u16 = 0x01;
/// flag bit 1: record describes a directory
pub const IS_DIRECTORY: u16 = 0x02;

/// Record header fields following the 4-byte signature.
#[derive(BinRead,Debug)]
#[br(little)]
struct MftHeader {
    usa_offset: u16,
    usa_size: u16,
    lsn: u64,
    sequence_number: u16,
    hard_link_count: u16,
    attribute_start: u16,
    flags: u16,
    logical_size: u32,
    physical_size: u32,
    base_record_ref: u64,
    next_attribute_id: u16,
    padding: u16,
    record_number: u32
}

/// Apply the fixup in place: for i in [1..usa_size), the two bytes at
/// `512*i - 2` are replaced with entry i of the update sequence array.
/// Entry 0 is the sentinel; each sector tail must match it before the
/// replacement, otherwise the record is torn and decoding stops.
pub fn apply_fixup(buf: &mut [u8],usa_offset: usize,usa_size: usize) -> Result<(),DYNERR> {
    if usa_size==0 {
        return Ok(());
    }
    if usa_offset + 2*usa_size > buf.len() {
        return Err(Box::new(crate::fs::Error::Corrupt));
    }
    let sentinel = [buf[usa_offset],buf[usa_offset+1]];
    for i in 1..usa_size {
        let tail = 512*i - 2;
        if tail + 2 > buf.len() {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        if [buf[tail],buf[tail+1]] != sentinel {
            warn!("fixup sentinel mismatch in sector {}",i-1);
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        buf[tail] = buf[usa_offset + 2*i];
        buf[tail+1] = buf[usa_offset + 2*i + 1];
    }
    Ok(())
}

/// One MFT record with the fixup already applied.
#[derive(Debug)]
pub struct MftRecord {
    header: MftHeader,
    buf: Vec<u8>
}

impl MftRecord {
    /// Decode a record buffer (1024 bytes unless the VBR says otherwise).
    /// Validates the "FILE" signature and applies the fixup.
    pub fn from_bytes(mut buf: Vec<u8>) -> Result<Self,DYNERR> {
        if buf.len() < 48 || &buf[0..4] != FILE_SIGNATURE {
            return Err(Box::new(crate::fs::Error::InvalidSignature));
        }
        let mut curs = Cursor::new(&buf[4..48]);
        let header: MftHeader = curs.read_le()?;
        apply_fixup(&mut buf,header.usa_offset as usize,header.usa_size as usize)?;
        Ok(Self { header, buf })
    }
    pub fn lsn(&self) -> u64 {
        self.header.lsn
    }
    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number
    }
    pub fn hard_link_count(&self) -> u16 {
        self.header.hard_link_count
    }
    pub fn attribute_start(&self) -> usize {
        self.header.attribute_start as usize
    }
    pub fn flags(&self) -> u16 {
        self.header.flags
    }
    pub fn in_use(&self) -> bool {
        self.header.flags & IN_USE != 0
    }
    pub fn is_directory(&self) -> bool {
        self.header.flags & IS_DIRECTORY != 0
    }
    pub fn logical_size(&self) -> u32 {
        self.header.logical_size
    }
    pub fn physical_size(&self) -> u32 {
        self.header.physical_size
    }
    /// 48-bit MFT number of the base record, 0 when this is a base record
    pub fn base_record_mft(&self) -> u64 {
        self.header.base_record_ref & 0x0000_ffff_ffff_ffff
    }
    /// 16-bit sequence number of the base record reference
    pub fn base_record_seq(&self) -> u16 {
        (self.header.base_record_ref >> 48) as u16
    }
    pub fn next_attribute_id(&self) -> u16 {
        self.header.next_attribute_id
    }
    pub fn record_number(&self) -> u64 {
        self.header.record_number as u64
    }
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }
    /// Decode the attribute stream.  A malformed attribute is logged and ends
    /// the iteration; whatever decoded before it is returned.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut ans: Vec<Attribute> = Vec::new();
        let mut pos = self.attribute_start();
        let end = std::cmp::min(self.header.logical_size as usize,self.buf.len());
        while pos + 8 <= end {
            let type_code = u32::from_le_bytes(self.buf[pos..pos+4].try_into().expect("bounds"));
            if type_code==END_MARKER {
                break;
            }
            let total = u32::from_le_bytes(self.buf[pos+4..pos+8].try_into().expect("bounds")) as usize;
            if total==0 || pos + total > end {
                warn!("attribute at {} has inconsistent length {}",pos,total);
                break;
            }
            match Attribute::parse(&self.buf,pos) {
                Ok(attr) => ans.push(attr),
                Err(e) => {
                    warn!("skipping malformed attribute of type {:X} ({})",type_code,e);
                }
            }
            pos += total;
        }
        ans
    }
    /// attributes of one type, in stream order
    pub fn attributes_of_type(&self,type_code: u32) -> Vec<Attribute> {
        self.attributes().into_iter().filter(|a| a.type_code()==type_code).collect()
    }
}
