//! ### NTFS Boot Record
//!
//! The NTFS VBR carries a BPB variant: the usual geometry fields, then 64-bit
//! counts for the volume and the locations of $MFT and $MFTMirr.  The
//! clusters-per-record field is signed; a negative value n encodes a record
//! size of `2^|n|` bytes regardless of the cluster size (the usual case is
//! -10, i.e. 1024-byte file records on 4K clusters).

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::debug;
use crate::img::Image;
use crate::DYNERR;

const BOOT_SIGNATURE: [u8;2] = [0x55,0xaa];

#[derive(BinRead,Debug)]
#[br(little)]
struct Bpb {
    jmp: [u8;3],
    oem: [u8;8],
    bytes_per_sec: u16,
    sec_per_clus: u8,
    reserved1: [u8;7],
    media: u8,
    zero1: u16,
    sec_per_trk: u16,
    num_heads: u16,
    hidd_sec: u32,
    reserved2: u32,
    /// usually 0x00800080
    signature_field: u32,
    tot_sec: u64,
    mft_lcn: u64,
    mft_mirr_lcn: u64,
    clus_per_rec: i8,
    reserved3: [u8;3],
    clus_per_indx: i8,
    reserved4: [u8;3],
    serial: u64,
    checksum: u32
}

/// The NTFS volume boot record.
pub struct BootSector {
    bpb: Bpb,
    signature: [u8;2]
}

impl BootSector {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 512 {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let mut curs = Cursor::new(&buf[0..84]);
        let bpb: Bpb = curs.read_le()?;
        Ok(Self {
            bpb,
            signature: [buf[510],buf[511]]
        })
    }
    /// signature bytes must be 0x55 0xAA
    pub fn valid_signature(&self) -> bool {
        self.signature==BOOT_SIGNATURE
    }
    /// Sanity checks with `debug` logs; the OEM name is advisory only.
    pub fn verify(&self) -> bool {
        let mut ans = true;
        if !self.bpb.oem.starts_with(b"NTFS") {
            debug!("OEM name is not NTFS");
            ans = false;
        }
        if ![512,1024,2048,4096].contains(&self.bpb.bytes_per_sec) {
            debug!("invalid bytes per sector {}",self.bpb.bytes_per_sec);
            ans = false;
        }
        if self.bpb.sec_per_clus==0 {
            debug!("invalid sectors per cluster 0");
            ans = false;
        }
        ans
    }
    pub fn oem_name(&self) -> String {
        String::from_utf8_lossy(&self.bpb.oem).trim_end().to_string()
    }
    pub fn bytes_per_sec(&self) -> u64 {
        self.bpb.bytes_per_sec as u64
    }
    pub fn secs_per_clus(&self) -> u64 {
        self.bpb.sec_per_clus as u64
    }
    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_sec() * self.secs_per_clus()
    }
    pub fn media(&self) -> u8 {
        self.bpb.media
    }
    pub fn is_floppy(&self) -> bool {
        self.bpb.media==0xf0
    }
    pub fn is_hard_disk(&self) -> bool {
        self.bpb.media==0xf8
    }
    pub fn secs_per_track(&self) -> u64 {
        self.bpb.sec_per_trk as u64
    }
    pub fn heads(&self) -> u64 {
        self.bpb.num_heads as u64
    }
    pub fn hidden_secs(&self) -> u64 {
        self.bpb.hidd_sec as u64
    }
    pub fn tot_sec(&self) -> u64 {
        self.bpb.tot_sec
    }
    pub fn mft_lcn(&self) -> u64 {
        self.bpb.mft_lcn
    }
    pub fn mft_mirr_lcn(&self) -> u64 {
        self.bpb.mft_mirr_lcn
    }
    /// bytes per MFT file record segment; negative raw values encode 2^|n|
    pub fn record_size(&self) -> u64 {
        match self.bpb.clus_per_rec {
            n if n > 0 => n as u64 * self.bytes_per_cluster(),
            n => 1u64 << n.unsigned_abs()
        }
    }
    /// bytes per INDX buffer; negative raw values encode 2^|n|
    pub fn index_buffer_size(&self) -> u64 {
        match self.bpb.clus_per_indx {
            n if n > 0 => n as u64 * self.bytes_per_cluster(),
            n => 1u64 << n.unsigned_abs()
        }
    }
    pub fn serial(&self) -> u64 {
        self.bpb.serial
    }
    pub fn serial_string(&self) -> String {
        hex::encode_upper(u64::to_be_bytes(self.bpb.serial))
    }
    pub fn checksum(&self) -> u32 {
        self.bpb.checksum
    }
    /// absolute byte offset of a cluster, counted from the start of the disk
    /// by way of the hidden sector count
    pub fn cluster_offset(&self,cluster: u64) -> u64 {
        self.hidden_secs() * self.bytes_per_sec() + cluster * self.bytes_per_cluster()
    }
    /// read one cluster's worth of data
    pub fn get_cluster(&self,cluster: u64,img: &mut dyn Image) -> Result<Vec<u8>,DYNERR> {
        img.read_at(self.cluster_offset(cluster),self.bytes_per_cluster() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ntfs_sector() -> Vec<u8> {
        let mut buf = vec![0;512];
        buf[0..3].copy_from_slice(&[0xeb,0x52,0x90]);
        buf[3..11].copy_from_slice(b"NTFS    ");
        buf[11..13].copy_from_slice(&u16::to_le_bytes(512));
        buf[13] = 8;
        buf[21] = 0xf8;
        buf[28..32].copy_from_slice(&u32::to_le_bytes(2048));
        buf[40..48].copy_from_slice(&u64::to_le_bytes(1048576));
        buf[48..56].copy_from_slice(&u64::to_le_bytes(4));
        buf[56..64].copy_from_slice(&u64::to_le_bytes(2));
        buf[64] = 0xf6; // -10 => 1024 byte records
        buf[68] = 1;    // one cluster per INDX buffer
        buf[72..80].copy_from_slice(&u64::to_le_bytes(0x1122334455667788));
        buf[510] = 0x55;
        buf[511] = 0xaa;
        buf
    }

    #[test]
    fn geometry() {
        let boot = BootSector::from_bytes(&ntfs_sector()).expect("decode failed");
        assert!(boot.valid_signature());
        assert!(boot.verify());
        assert_eq!(boot.bytes_per_cluster(),4096);
        assert_eq!(boot.mft_lcn(),4);
        assert_eq!(boot.record_size(),1024);
        assert_eq!(boot.index_buffer_size(),4096);
        assert_eq!(boot.cluster_offset(0),2048*512);
        assert_eq!(boot.cluster_offset(4),2048*512 + 4*4096);
        assert!(boot.is_hard_disk());
    }
}
