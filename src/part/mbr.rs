//! ### MBR Scanner
//!
//! The Master Boot Record is the first sector of the disk: 446 bytes of boot code,
//! four 16-byte partition entries, and the 0x55AA signature.  An Extended Boot Record
//! is the same layout embedded at the head of each logical-partition slot inside an
//! extended container; entry 1 points at the logical partition and entry 2 links to
//! the next EBR.

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::{debug,warn};
use crate::img::Image;
use super::{Error,PartitionRef};
use crate::DYNERR;

/// MBR type codes that mark an extended container
pub const EXTENDED_TYPES: [u8;7] = [0x05,0x0f,0x85,0x91,0x9b,0xc5,0xe4];
/// MBR type codes that mark swap space, the mount collaborator skips these
pub const SWAP_TYPES: [u8;5] = [0x42,0x82,0xb8,0xc3,0xfc];
/// The single entry type of a GPT protective MBR
pub const GPT_PROTECTIVE: u8 = 0xee;
const BOOT_SIGNATURE: [u8;2] = [0x55,0xaa];
/// cap on EBR links, guards against cycles in a corrupt chain
const MAX_EBR_LINKS: usize = 128;

/// One 16-byte partition entry.  CHS fields pack the cylinder high bits
/// into the upper 2 bits of the sector byte.
#[derive(BinRead,Clone,Copy,Debug,PartialEq,Eq)]
#[br(little)]
pub struct PartEntry {
    active: u8,
    start_head: u8,
    start_sec: u8,
    start_cyl: u8,
    type_code: u8,
    end_head: u8,
    end_sec: u8,
    end_cyl: u8,
    first_lba: u32,
    sector_count: u32
}

impl PartEntry {
    pub fn is_active(&self) -> bool {
        self.active==0x80
    }
    pub fn is_empty(&self) -> bool {
        self.type_code==0
    }
    pub fn type_code(&self) -> u8 {
        self.type_code
    }
    pub fn first_lba(&self) -> u64 {
        self.first_lba as u64
    }
    pub fn sector_count(&self) -> u64 {
        self.sector_count as u64
    }
    pub fn start_head(&self) -> u8 {
        self.start_head
    }
    /// lower 6 bits of the sector byte
    pub fn start_sector(&self) -> u8 {
        self.start_sec & 0x3f
    }
    /// cylinder with the upper 2 bits taken from the sector byte
    pub fn start_cylinder(&self) -> u16 {
        (((self.start_sec & 0xc0) as u16) << 2) | self.start_cyl as u16
    }
    pub fn end_head(&self) -> u8 {
        self.end_head
    }
    pub fn end_sector(&self) -> u8 {
        self.end_sec & 0x3f
    }
    pub fn end_cylinder(&self) -> u16 {
        (((self.end_sec & 0xc0) as u16) << 2) | self.end_cyl as u16
    }
    pub fn to_bytes(&self) -> [u8;16] {
        let mut ans: [u8;16] = [0;16];
        ans[0] = self.active;
        ans[1] = self.start_head;
        ans[2] = self.start_sec;
        ans[3] = self.start_cyl;
        ans[4] = self.type_code;
        ans[5] = self.end_head;
        ans[6] = self.end_sec;
        ans[7] = self.end_cyl;
        ans[8..12].copy_from_slice(&u32::to_le_bytes(self.first_lba));
        ans[12..16].copy_from_slice(&u32::to_le_bytes(self.sector_count));
        ans
    }
}

/// Master Boot Record, also used for every EBR in an extended chain.
pub struct Mbr {
    entries: [PartEntry;4],
    signature: [u8;2]
}

impl Mbr {
    /// Decode a 512-byte sector.  The signature is captured but not enforced here,
    /// callers decide what an invalid signature means for them.
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 512 {
            return Err(Box::new(Error::TruncatedSector));
        }
        let mut curs = Cursor::new(&buf[446..510]);
        let entries = [
            curs.read_le::<PartEntry>()?,
            curs.read_le::<PartEntry>()?,
            curs.read_le::<PartEntry>()?,
            curs.read_le::<PartEntry>()?
        ];
        Ok(Self {
            entries,
            signature: [buf[510],buf[511]]
        })
    }
    /// signature bytes must be 0x55 0xAA
    pub fn valid_signature(&self) -> bool {
        self.signature==BOOT_SIGNATURE
    }
    /// entry index is 0-based here; partitions are numbered from 1 in listings
    pub fn entry(&self,idx: usize) -> &PartEntry {
        &self.entries[idx]
    }
    pub fn entries(&self) -> &[PartEntry;4] {
        &self.entries
    }
    /// A GPT protective MBR has its one and only entry typed 0xEE
    pub fn is_protective(&self) -> bool {
        self.entries[0].type_code==GPT_PROTECTIVE
    }
    /// Re-encode the table region; boot code comes back as zeroes.
    pub fn to_bytes(&self) -> [u8;512] {
        let mut ans: [u8;512] = [0;512];
        for i in 0..4 {
            ans[446+16*i..462+16*i].copy_from_slice(&self.entries[i].to_bytes());
        }
        ans[510..512].copy_from_slice(&self.signature);
        ans
    }
}

/// Walk the EBR linked list inside an extended container starting at `ebr_base`.
/// Entry 1 of each EBR is relative to that EBR's own sector, while entry 2 is
/// relative to the first EBR of the chain.  Logical partitions are numbered
/// from `first_index` (normally 5).
pub fn walk_extended(img: &mut dyn Image,ebr_base: u64,first_index: usize) -> Result<Vec<PartitionRef>,DYNERR> {
    let mut ans: Vec<PartitionRef> = Vec::new();
    let mut cursor = ebr_base;
    let mut index = first_index;
    for _i in 0..MAX_EBR_LINKS {
        let sector = img.read_sectors(cursor,1)?;
        let ebr = Mbr::from_bytes(&sector)?;
        if !ebr.valid_signature() {
            warn!("EBR at sector {} has a bad signature, ending the walk",cursor);
            return Ok(ans);
        }
        let data_entry = ebr.entry(0);
        if !data_entry.is_empty() {
            debug!("logical partition {} at sector {}",index,cursor + data_entry.first_lba());
            ans.push(PartitionRef::logical(
                index,
                data_entry.type_code(),
                cursor + data_entry.first_lba(),
                data_entry.sector_count()
            ));
        }
        let link_entry = ebr.entry(1);
        if link_entry.is_empty() {
            debug!("found the end of the extended chain");
            return Ok(ans);
        }
        cursor = ebr_base + link_entry.first_lba();
        index += 1;
    }
    Err(Box::new(Error::ChainTooLong))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::img::MemImage;

    fn entry_bytes(active: u8,typ: u8,first_lba: u32,count: u32) -> [u8;16] {
        let mut ans: [u8;16] = [0;16];
        ans[0] = active;
        ans[4] = typ;
        ans[8..12].copy_from_slice(&u32::to_le_bytes(first_lba));
        ans[12..16].copy_from_slice(&u32::to_le_bytes(count));
        ans
    }

    fn sector_with_entries(entries: &[[u8;16]]) -> Vec<u8> {
        let mut sec = vec![0;512];
        for (i,e) in entries.iter().enumerate() {
            sec[446+16*i..462+16*i].copy_from_slice(e);
        }
        sec[510] = 0x55;
        sec[511] = 0xaa;
        sec
    }

    #[test]
    fn round_trip() {
        let sec = sector_with_entries(&[entry_bytes(0x80,0x0c,2048,131072)]);
        let mbr = Mbr::from_bytes(&sec).expect("decode failed");
        assert!(mbr.valid_signature());
        assert_eq!(mbr.to_bytes().to_vec(),sec);
        let again = Mbr::from_bytes(&mbr.to_bytes()).expect("decode failed");
        assert_eq!(again.entries(),mbr.entries());
    }

    #[test]
    fn signature_check() {
        let mut sec = sector_with_entries(&[]);
        sec[511] = 0x00;
        let mbr = Mbr::from_bytes(&sec).expect("decode failed");
        assert!(!mbr.valid_signature());
    }

    #[test]
    fn chs_unpacking() {
        let mut raw = entry_bytes(0x00,0x06,63,1000);
        raw[1] = 1; // start head
        raw[2] = 0b1100_0010; // sector 2, cylinder high bits 0b11
        raw[3] = 0x34; // cylinder low byte
        let sec = sector_with_entries(&[raw]);
        let mbr = Mbr::from_bytes(&sec).expect("decode failed");
        let entry = mbr.entry(0);
        assert_eq!(entry.start_head(),1);
        assert_eq!(entry.start_sector(),2);
        assert_eq!(entry.start_cylinder(),(0b11 << 8) | 0x34);
    }

    #[test]
    fn extended_walk() {
        // container at sector 100; EBR 1 links to EBR 2 at container-relative 50
        let mut img_buf = vec![0;512*200];
        let ebr1 = sector_with_entries(&[
            entry_bytes(0,0x06,10,20),
            entry_bytes(0,0x05,50,30)
        ]);
        let ebr2 = sector_with_entries(&[
            entry_bytes(0,0x06,5,25)
        ]);
        img_buf[512*100..512*101].copy_from_slice(&ebr1);
        img_buf[512*150..512*151].copy_from_slice(&ebr2);
        let mut img = MemImage::new(img_buf);
        let parts = walk_extended(&mut img,100,5).expect("walk failed");
        assert_eq!(parts.len(),2);
        assert_eq!(parts[0].index,5);
        assert_eq!(parts[0].first_lba,110);
        assert_eq!(parts[0].sector_count,20);
        assert_eq!(parts[1].index,6);
        assert_eq!(parts[1].first_lba,155);
        assert_eq!(parts[1].sector_count,25);
    }
}
