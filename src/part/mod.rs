//! # Partition Module
//!
//! Partition discovery over the two schemes found on raw images: MBR (four primary
//! entries plus the EBR linked list inside an extended container) and GPT.  Scanning
//! yields `PartitionRef` value objects in on-disk order; these are never mutated.
//!
//! The OS mount machinery is an external collaborator.  For each mountable partition
//! we only emit a `MountPlan` carrying the image path, a mount point, the byte offset,
//! and an optional size limit; the host turns that into a loopback mount.

pub mod mbr;
pub mod gpt;

use std::fmt;
use log::info;
use crate::bios::bytes::Guid;
use crate::img::Image;
use crate::DYNERR;

/// Enumerates partition scanning errors.  The `Display` trait will print the equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("sector is truncated")]
    TruncatedSector,
    #[error("bad boot signature")]
    BadSignature,
    #[error("missing GPT header")]
    MissingGptHeader,
    #[error("extended partition chain too long")]
    ChainTooLong,
    #[error("bad GUID string")]
    BadGuidString
}

/// Partitioning scheme found on the image
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum Scheme {
    Mbr,
    Gpt
}

impl fmt::Display for Scheme {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mbr => write!(f,"MBR"),
            Self::Gpt => write!(f,"GPT")
        }
    }
}

/// Reference to one discovered partition.  MBR partitions carry a type code,
/// GPT partitions carry type and unique GUIDs and possibly a name.
pub struct PartitionRef {
    pub scheme: Scheme,
    /// primaries are 1-4, logicals start at 5, GPT entries are 0-based table slots
    pub index: usize,
    pub type_code: Option<u8>,
    pub type_guid: Option<Guid>,
    pub first_lba: u64,
    pub sector_count: u64,
    pub label: Option<String>,
    /// logical partitions inside an extended container get no size limit when mounted
    logical: bool
}

impl PartitionRef {
    pub fn primary(index: usize,entry: &mbr::PartEntry) -> Self {
        Self {
            scheme: Scheme::Mbr,
            index,
            type_code: Some(entry.type_code()),
            type_guid: None,
            first_lba: entry.first_lba(),
            sector_count: entry.sector_count(),
            label: None,
            logical: false
        }
    }
    pub fn logical(index: usize,type_code: u8,first_lba: u64,sector_count: u64) -> Self {
        Self {
            scheme: Scheme::Mbr,
            index,
            type_code: Some(type_code),
            type_guid: None,
            first_lba,
            sector_count,
            label: None,
            logical: true
        }
    }
    pub fn from_gpt(index: usize,entry: &gpt::GptEntry) -> Self {
        Self {
            scheme: Scheme::Gpt,
            index,
            type_code: None,
            type_guid: Some(entry.type_guid()),
            first_lba: entry.first_lba(),
            sector_count: entry.last_lba() - entry.first_lba() + 1,
            label: Some(entry.name()),
            logical: false
        }
    }
    pub fn offset_bytes(&self) -> u64 {
        self.first_lba * 512
    }
    pub fn size_bytes(&self) -> u64 {
        self.sector_count * 512
    }
    pub fn is_swap(&self) -> bool {
        match self.type_code {
            Some(t) => mbr::SWAP_TYPES.contains(&t),
            None => false
        }
    }
    pub fn is_extended_container(&self) -> bool {
        match self.type_code {
            Some(t) => mbr::EXTENDED_TYPES.contains(&t),
            None => false
        }
    }
    /// Should the mount collaborator attempt this partition?
    /// Swap, extended containers, the GPT protective entry, and GPT types
    /// outside the supported list are all skipped.
    pub fn is_mountable(&self) -> bool {
        match self.scheme {
            Scheme::Mbr => {
                let typ = self.type_code.unwrap_or(0);
                typ != 0 && typ != mbr::GPT_PROTECTIVE && !self.is_swap() && !self.is_extended_container()
            },
            Scheme::Gpt => match &self.type_guid {
                Some(guid) => gpt::is_supported(guid),
                None => false
            }
        }
    }
    /// Build the tuple handed to the host's loopback mounter.
    pub fn mount_plan(&self,image: &str) -> Option<MountPlan> {
        if !self.is_mountable() {
            return None;
        }
        Some(MountPlan {
            image: image.to_string(),
            mountpoint: format!("/media/part{}",self.index),
            offset_bytes: self.offset_bytes(),
            size_limit: match self.logical {
                true => None,
                false => Some(self.size_bytes())
            }
        })
    }
}

/// One loopback mount the host should perform; read-only by construction.
pub struct MountPlan {
    pub image: String,
    pub mountpoint: String,
    pub offset_bytes: u64,
    pub size_limit: Option<u64>
}

impl MountPlan {
    /// Option string for `mount -o`
    pub fn options(&self) -> String {
        match self.size_limit {
            Some(limit) => format!("loop,ro,noatime,offset={},sizelimit={}",self.offset_bytes,limit),
            None => format!("loop,ro,noatime,offset={}",self.offset_bytes)
        }
    }
}

impl fmt::Display for MountPlan {
    fn fmt(&self,f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,"mount -o {} {} {}",self.options(),self.image,self.mountpoint)
    }
}

/// Identify the partition scheme and enumerate all partitions in on-disk order.
/// MBR extended containers are walked for their logical partitions.
pub fn scan_partitions(img: &mut dyn Image) -> Result<(Scheme,Vec<PartitionRef>),DYNERR> {
    let sector = img.read_sectors(0,1)?;
    let boot = mbr::Mbr::from_bytes(&sector)?;
    if !boot.valid_signature() {
        return Err(Box::new(Error::BadSignature));
    }
    if boot.is_protective() {
        info!("protective MBR found, scanning GPT");
        return Ok((Scheme::Gpt,gpt::scan(img)?));
    }
    let mut ans: Vec<PartitionRef> = Vec::new();
    let mut next_logical = 5;
    for i in 0..4 {
        let entry = boot.entry(i);
        if entry.is_empty() {
            continue;
        }
        ans.push(PartitionRef::primary(i+1,entry));
        if mbr::EXTENDED_TYPES.contains(&entry.type_code()) {
            info!("found an extended partition at sector {}",entry.first_lba());
            let mut logicals = mbr::walk_extended(img,entry.first_lba(),next_logical)?;
            next_logical += logicals.len();
            ans.append(&mut logicals);
        }
    }
    Ok((Scheme::Mbr,ans))
}
