//! ## NTFS File System Module
//!
//! Read-only analysis of NTFS volumes.  The boot record is implemented in
//! `crate::bios::ntfs`; this module ties it to an image and serves MFT records
//! and clusters to the attribute and extraction machinery.
//!
//! Two run modes deal with MFT fragmentation.  Image-only mode assumes the MFT
//! runs contiguously from its starting LCN and aborts with `FragmentedMft`
//! when a fetched record's stored number disagrees with the request.
//! External-MFT mode indexes a supplied linearized MFT stream by
//! `record_size * n`, sidestepping the layout question entirely.

pub mod mft;
pub mod attr;
pub mod index;
pub mod extract;

use chrono::{DateTime,TimeZone,Utc};
use log::{debug,error};
use crate::bios::ntfs::BootSector;
use crate::img::Image;
use mft::MftRecord;
use crate::DYNERR;

/// seconds between 1601-01-01 and the Unix epoch
const EPOCH_DELTA_SECS: i64 = 11_644_473_600;

/// Convert a Windows FILETIME (100 ns ticks since 1601-01-01 UTC) to civil time.
/// Zero and all pre-epoch values map to the Unix epoch; out-of-range values
/// saturate at chrono's maximum.
pub fn filetime_to_datetime(filetime: u64) -> DateTime<Utc> {
    let secs = (filetime / 10_000_000) as i64 - EPOCH_DELTA_SECS;
    if secs <= 0 {
        return Utc.timestamp_opt(0,0).unwrap();
    }
    let nanos = ((filetime % 10_000_000) * 100) as u32;
    match Utc.timestamp_opt(secs,nanos) {
        chrono::LocalResult::Single(t) => t,
        _ => DateTime::<Utc>::MAX_UTC
    }
}

/// The primary interface for NTFS volume analysis.
/// Takes ownership of the image.
pub struct Volume {
    img: Box<dyn Image>,
    /// byte offset of the volume within the image
    offset: u64,
    vbr: BootSector,
    /// pre-extracted linearized MFT, indexed by record number
    mft_stream: Option<Vec<u8>>
}

impl Volume {
    /// Open the volume whose VBR is at sector `offset_secs` of the image.
    pub fn from_img(mut img: Box<dyn Image>,offset_secs: u64) -> Result<Self,DYNERR> {
        let buf = img.read_sectors(offset_secs,1)?;
        let vbr = BootSector::from_bytes(&buf)?;
        if !vbr.valid_signature() {
            error!("NTFS boot sector signature is invalid");
            return Err(Box::new(super::Error::InvalidSignature));
        }
        debug!("NTFS volume, MFT at LCN {}, {} byte clusters",vbr.mft_lcn(),vbr.bytes_per_cluster());
        Ok(Self {
            img,
            offset: offset_secs * 512,
            vbr,
            mft_stream: None
        })
    }
    /// Switch to external-MFT mode with a linearized MFT stream.
    pub fn set_mft_stream(&mut self,stream: Vec<u8>) {
        self.mft_stream = Some(stream);
    }
    pub fn vbr(&self) -> &BootSector {
        &self.vbr
    }
    pub fn volume_offset(&self) -> u64 {
        self.offset
    }
    pub fn record_size(&self) -> u64 {
        self.vbr.record_size()
    }
    /// Fetch and decode MFT record `n`.  The stored record number must match
    /// the request; a mismatch means the MFT is fragmented and the naive
    /// offset arithmetic is invalid.
    pub fn record(&mut self,n: u64) -> Result<MftRecord,DYNERR> {
        let size = self.vbr.record_size();
        let buf = match &self.mft_stream {
            Some(stream) => {
                let beg = (n * size) as usize;
                if beg + size as usize > stream.len() {
                    return Err(Box::new(crate::img::Error::OutOfBounds));
                }
                stream[beg..beg + size as usize].to_vec()
            },
            None => {
                let offset = self.offset
                    + self.vbr.mft_lcn() * self.vbr.bytes_per_cluster()
                    + n * size;
                self.img.read_at(offset,size as usize)?
            }
        };
        let rec = MftRecord::from_bytes(buf)?;
        if rec.record_number() != n {
            error!("record {} carries number {}, the MFT is fragmented",n,rec.record_number());
            return Err(Box::new(super::Error::FragmentedMft));
        }
        Ok(rec)
    }
    /// Read one cluster, addressed the way the boot record addresses clusters
    /// (hidden sectors plus LCN).
    pub fn cluster(&mut self,lcn: u64) -> Result<Vec<u8>,DYNERR> {
        self.vbr.get_cluster(lcn,self.img.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetime_epoch_anchor() {
        let epoch = filetime_to_datetime(116_444_736_000_000_000);
        assert_eq!(epoch.timestamp(),0);
    }

    #[test]
    fn filetime_zero_maps_to_epoch() {
        assert_eq!(filetime_to_datetime(0).timestamp(),0);
        assert_eq!(filetime_to_datetime(1).timestamp(),0);
    }

    #[test]
    fn filetime_known_date() {
        // 2015-07-15 00:00:00 UTC = 1436918400 Unix seconds
        let ft = (1_436_918_400 + EPOCH_DELTA_SECS) as u64 * 10_000_000;
        let t = filetime_to_datetime(ft);
        assert_eq!(t.timestamp(),1_436_918_400);
    }

    #[test]
    fn filetime_overflow_saturates() {
        let t = filetime_to_datetime(u64::MAX);
        assert!(t.timestamp() > 0);
    }
}
