//! ## BIOS Parameter Block Module
//!
//! This contains the FAT volume boot record (VBR) with its BIOS parameter block (BPB).
//! Implementation is based on Microsoft Hardware White Paper,
//! "FAT: General Overview of On-Disk Format," Dec. 6, 2000.
//!
//! One structure serves all three FAT widths.  The FAT32 fields are only present
//! when the variant detection says so; detection does not trust the display string
//! in the tail, it uses the zeroed `fat_size_16`/`root_ent_cnt` fields and then
//! the cluster count.

use std::io::Cursor;
use binrw::{BinRead,BinReaderExt};
use log::debug;
use crate::DYNERR;

const BOOT_SIGNATURE: [u8;2] = [0x55,0xaa];
/// cluster counts at or above this are FAT16, below are FAT12
const FAT12_MAX_CLUSTERS: u64 = 4085;

/// Fields applicable to all FAT file systems, starting at byte 11 of the boot sector.
#[derive(BinRead,Debug)]
#[br(little)]
pub struct BpbFoundation {
    /// 512, 1024, 2048, or 4096
    bytes_per_sec: u16,
    /// 1, 2, 4, 8, 16, 32, 64, or 128
    sec_per_clus: u8,
    /// usually 1 for FAT12/16, 32 for FAT32
    reserved_sectors: u16,
    /// usually 2
    num_fats: u8,
    /// root directory entries, must be 0 for FAT32
    root_ent_cnt: u16,
    /// 16-bit sector count, superseded by tot_sec_32 if 0
    tot_sec_16: u16,
    /// 0xf0 removable, 0xf8 fixed
    media: u8,
    /// sectors per FAT, 0 for FAT32
    fat_size_16: u16,
    sec_per_trk: u16,
    num_heads: u16,
    /// sectors preceding this volume's partition
    hidd_sec: u32,
    /// 32-bit sector count, used when tot_sec_16 is 0
    tot_sec_32: u32
}

/// FAT32 extension, bytes 36..64 of the boot sector.
#[derive(BinRead,Debug)]
#[br(little)]
pub struct BpbExtension32 {
    fat_size_32: u32,
    /// bits 0-3 active FAT, bit 7 disables mirroring
    flags: u16,
    fs_version: u16,
    /// cluster number of the root directory, usually 2
    root_cluster: u32,
    /// sector of the FSINFO structure, usually 1
    fs_info: u16,
    /// sector of the backup boot record, usually 6
    bk_boot_sec: u16,
    reserved: [u8;12]
}

/// Tail following the BPB, at byte 36 (FAT12/16) or 64 (FAT32).
#[derive(BinRead,Debug)]
#[br(little)]
pub struct BpbTail {
    drv_num: u8,
    reserved1: u8,
    /// 0x29 means the next three fields are present
    boot_sig: u8,
    vol_id: u32,
    vol_lab: [u8;11],
    /// display only, never used to determine the FAT type
    fil_sys_type: [u8;8]
}

/// The FAT volume boot record. This decodes the whole first sector of the volume,
/// detects the FAT variant, and provides the cluster arithmetic every other FAT
/// module relies on.
pub struct BootSector {
    jmp: [u8;3],
    oem: [u8;8],
    foundation: BpbFoundation,
    extension32: Option<BpbExtension32>,
    tail: BpbTail,
    signature: [u8;2]
}

impl BootSector {
    pub fn from_bytes(buf: &[u8]) -> Result<Self,DYNERR> {
        if buf.len() < 512 {
            return Err(Box::new(crate::fs::Error::Corrupt));
        }
        let mut jmp: [u8;3] = [0;3];
        jmp.copy_from_slice(&buf[0..3]);
        let mut oem: [u8;8] = [0;8];
        oem.copy_from_slice(&buf[3..11]);
        let mut curs = Cursor::new(&buf[11..36]);
        let foundation: BpbFoundation = curs.read_le()?;
        // FAT32 is signaled by the 16-bit FAT size or the root entry count being 0
        let fat32 = foundation.fat_size_16==0 || foundation.root_ent_cnt==0;
        let (extension32,tail) = match fat32 {
            true => {
                let mut curs = Cursor::new(&buf[36..64]);
                let ext: BpbExtension32 = curs.read_le()?;
                let mut curs = Cursor::new(&buf[64..90]);
                (Some(ext),curs.read_le::<BpbTail>()?)
            },
            false => {
                let mut curs = Cursor::new(&buf[36..62]);
                (None,curs.read_le::<BpbTail>()?)
            }
        };
        Ok(Self {
            jmp,
            oem,
            foundation,
            extension32,
            tail,
            signature: [buf[510],buf[511]]
        })
    }
    /// signature bytes must be 0x55 0xAA
    pub fn valid_signature(&self) -> bool {
        self.signature==BOOT_SIGNATURE
    }
    /// Sanity checks on the foundation fields, `debug` logs explain any failure.
    pub fn verify(&self) -> bool {
        let mut ans = true;
        if ![512,1024,2048,4096].contains(&self.foundation.bytes_per_sec) {
            debug!("invalid bytes per sector {}",self.foundation.bytes_per_sec);
            ans = false;
        }
        if ![1,2,4,8,16,32,64,128].contains(&self.foundation.sec_per_clus) {
            debug!("invalid sectors per cluster {}",self.foundation.sec_per_clus);
            ans = false;
        }
        if self.foundation.reserved_sectors==0 {
            debug!("invalid count of reserved sectors 0");
            ans = false;
        }
        if self.foundation.num_fats==0 {
            debug!("invalid count of FATs 0");
            ans = false;
        }
        if self.foundation.tot_sec_16==0 && self.foundation.tot_sec_32==0 {
            debug!("invalid sector count 0");
            ans = false;
        }
        ans
    }
    pub fn jump_code(&self) -> [u8;3] {
        self.jmp
    }
    pub fn oem_name(&self) -> String {
        String::from_utf8_lossy(&self.oem).trim_end().to_string()
    }
    pub fn drive_number(&self) -> u8 {
        self.tail.drv_num
    }
    /// 0x29 means the serial, label, and type string fields are present
    pub fn has_extended_fields(&self) -> bool {
        self.tail.boot_sig==0x29
    }
    pub fn fs_version(&self) -> Option<u16> {
        self.extension32.as_ref().map(|ext| ext.fs_version)
    }
    pub fn sec_size(&self) -> u64 {
        self.foundation.bytes_per_sec as u64
    }
    pub fn secs_per_clus(&self) -> u64 {
        self.foundation.sec_per_clus as u64
    }
    /// bytes per cluster
    pub fn block_size(&self) -> u64 {
        self.sec_size() * self.secs_per_clus()
    }
    pub fn res_secs(&self) -> u64 {
        self.foundation.reserved_sectors as u64
    }
    pub fn num_fats(&self) -> u64 {
        self.foundation.num_fats as u64
    }
    pub fn root_dir_entries(&self) -> u64 {
        self.foundation.root_ent_cnt as u64
    }
    pub fn media(&self) -> u8 {
        self.foundation.media
    }
    pub fn heads(&self) -> u64 {
        self.foundation.num_heads as u64
    }
    pub fn secs_per_track(&self) -> u64 {
        self.foundation.sec_per_trk as u64
    }
    pub fn hidden_secs(&self) -> u64 {
        self.foundation.hidd_sec as u64
    }
    /// the 16-bit count wins when nonzero
    pub fn tot_sec(&self) -> u64 {
        match self.foundation.tot_sec_16 {
            0 => self.foundation.tot_sec_32 as u64,
            small => small as u64
        }
    }
    /// the 16-bit count wins when nonzero
    pub fn fat_secs(&self) -> u64 {
        match (self.foundation.fat_size_16,&self.extension32) {
            (0,Some(ext)) => ext.fat_size_32 as u64,
            (sz,_) => sz as u64
        }
    }
    pub fn is_fat32(&self) -> bool {
        self.extension32.is_some()
    }
    /// 12, 16, or 32; FAT12 vs FAT16 is decided by the cluster count
    pub fn fat_type(&self) -> usize {
        match self.is_fat32() {
            true => 32,
            false => match self.cluster_count() < FAT12_MAX_CLUSTERS {
                true => 12,
                false => 16
            }
        }
    }
    /// sectors occupied by the FAT12/16 root directory
    pub fn root_dir_secs(&self) -> u64 {
        self.root_dir_entries() / 16
    }
    /// first sector of the data area, relative to the volume
    pub fn data_start_sec(&self) -> u64 {
        self.res_secs() + self.num_fats()*self.fat_secs() + self.root_dir_secs()
    }
    /// count of data clusters, cluster numbers then run 2..2+count
    pub fn cluster_count(&self) -> u64 {
        let tot = self.tot_sec();
        let start = self.data_start_sec();
        match tot > start {
            true => (tot - start) / self.secs_per_clus(),
            false => 0
        }
    }
    /// first data cluster number is 2, anything past the data area is out of range
    pub fn max_cluster(&self) -> u64 {
        2 + self.cluster_count()
    }
    /// volume-relative sector of the given cluster
    pub fn sector_from_cluster(&self,cluster: u64) -> u64 {
        self.data_start_sec() + (cluster-2)*self.secs_per_clus()
    }
    /// volume-relative byte offset of the given cluster
    pub fn offset_from_cluster(&self,cluster: u64) -> u64 {
        self.sec_size() * self.sector_from_cluster(cluster)
    }
    pub fn cluster_from_sector(&self,sector: u64) -> u64 {
        (sector - self.data_start_sec()) / self.secs_per_clus() + 2
    }
    /// volume-relative sector of the first FAT
    pub fn sector_of_fat1(&self) -> u64 {
        self.res_secs()
    }
    /// volume-relative sector of the second FAT
    pub fn sector_of_fat2(&self) -> u64 {
        self.res_secs() + self.fat_secs()
    }
    /// [first,end) sector range of the FAT12/16 root directory
    pub fn root_dir_sec_rng(&self) -> [u64;2] {
        let beg = self.res_secs() + self.num_fats()*self.fat_secs();
        [beg,beg + self.root_dir_secs()]
    }
    /// first cluster of the FAT32 root directory
    pub fn root_dir_cluster1(&self) -> Option<u64> {
        self.extension32.as_ref().map(|ext| ext.root_cluster as u64)
    }
    pub fn mirror_flags(&self) -> Option<u16> {
        self.extension32.as_ref().map(|ext| ext.flags)
    }
    pub fn fs_info_sec(&self) -> Option<u64> {
        self.extension32.as_ref().map(|ext| ext.fs_info as u64)
    }
    pub fn backup_boot_sec(&self) -> Option<u64> {
        self.extension32.as_ref().map(|ext| ext.bk_boot_sec as u64)
    }
    pub fn serial(&self) -> u32 {
        self.tail.vol_id
    }
    pub fn label(&self) -> String {
        String::from_utf8_lossy(&self.tail.vol_lab).trim_end().to_string()
    }
    /// display string such as "FAT16   ", never used for detection
    pub fn fs_type_string(&self) -> String {
        String::from_utf8_lossy(&self.tail.fil_sys_type).trim_end().to_string()
    }
}
