//! ## FAT File System Module
//!
//! Read-only analysis of FAT12/16/32 volumes.  The FAT itself is implemented in
//! `crate::bios::fat`, the boot sector in `crate::bios::bpb`; this module ties them
//! to an image and walks directories and cluster chains.
//!
//! The volume is addressed relative to a partition byte offset supplied at open
//! time, so the same code serves whole-volume images and partitioned disks.

pub mod pack;
pub mod directory;
pub mod recover;

use log::{debug,error};
use crate::bios::{bpb,fat};
use crate::img::Image;
use directory::Directory;
use crate::DYNERR;

/// The primary interface for FAT volume analysis.
/// Takes ownership of the image, buffers the first FAT lazily.
pub struct Disk {
    img: Box<dyn Image>,
    /// byte offset of the volume within the image
    offset: u64,
    boot_sector: bpb::BootSector,
    maybe_fat: Option<fat::Fat>
}

impl Disk {
    /// Open the volume whose VBR is at sector `offset_secs` of the image.
    /// The DiskFS takes ownership of the image.
    pub fn from_img(mut img: Box<dyn Image>,offset_secs: u64) -> Result<Self,DYNERR> {
        let buf = img.read_sectors(offset_secs,1)?;
        let boot_sector = bpb::BootSector::from_bytes(&buf)?;
        if !boot_sector.valid_signature() {
            error!("FAT boot sector signature is invalid");
            return Err(Box::new(super::Error::InvalidSignature));
        }
        if !boot_sector.verify() {
            error!("FAT boot sector failed sanity checks");
            return Err(Box::new(super::Error::Corrupt));
        }
        debug!("FAT{} volume, {} sectors",boot_sector.fat_type(),boot_sector.tot_sec());
        Ok(Self {
            img,
            offset: offset_secs * 512,
            boot_sector,
            maybe_fat: None
        })
    }
    pub fn boot_sector(&self) -> &bpb::BootSector {
        &self.boot_sector
    }
    /// byte offset of the volume within the image
    pub fn volume_offset(&self) -> u64 {
        self.offset
    }
    /// bytes per cluster
    pub fn cluster_size(&self) -> u64 {
        self.boot_sector.block_size()
    }
    pub fn is_fat32(&self) -> bool {
        self.boot_sector.is_fat32()
    }
    /// Buffer the first FAT if not already present.
    fn open_fat_buffer(&mut self) -> Result<(),DYNERR> {
        if self.maybe_fat.is_none() {
            let sec1 = self.boot_sector.sector_of_fat1();
            let fat_secs = self.boot_sector.fat_secs();
            let sec_size = self.boot_sector.sec_size() as usize;
            debug!("buffering FAT: {} sectors from volume sector {}",fat_secs,sec1);
            let buf = self.img.read_at(self.offset + sec1*self.boot_sector.sec_size(),fat_secs as usize * sec_size)?;
            self.maybe_fat = Some(fat::Fat::new(buf,self.boot_sector.fat_type(),self.boot_sector.cluster_count()));
        }
        Ok(())
    }
    /// Get the buffered FAT, opening it if necessary.
    pub fn fat(&mut self) -> Result<&fat::Fat,DYNERR> {
        self.open_fat_buffer()?;
        match self.maybe_fat.as_ref() {
            Some(f) => Ok(f),
            None => panic!("FAT buffer failed to open")
        }
    }
    pub fn is_free_cluster(&mut self,cluster: u64) -> Result<bool,DYNERR> {
        Ok(self.fat()?.is_free(cluster))
    }
    /// Raw image read at an absolute byte offset, used by the recovery
    /// heuristics to examine slack space.
    pub fn img_read(&mut self,offset: u64,n: usize) -> Result<Vec<u8>,DYNERR> {
        self.img.read_at(offset,n)
    }
    /// Read one cluster's worth of data.
    pub fn read_cluster(&mut self,cluster: u64) -> Result<Vec<u8>,DYNERR> {
        let offset = self.offset + self.boot_sector.offset_from_cluster(cluster);
        self.img.read_at(offset,self.boot_sector.block_size() as usize)
    }
    /// Follow the chain from `initial` and buffer the entire data set.
    pub fn cluster_chain_data(&mut self,initial: u64) -> Result<Vec<u8>,DYNERR> {
        let chain = self.fat()?.chain(initial);
        let mut ans: Vec<u8> = Vec::new();
        for cluster in chain {
            ans.append(&mut self.read_cluster(cluster)?);
        }
        Ok(ans)
    }
    /// Return (volume label, root directory).  If there is no label it is set
    /// to "NO NAME" per MS docs.
    pub fn root_directory(&mut self) -> Result<(String,Directory),DYNERR> {
        let root = match self.boot_sector.root_dir_cluster1() {
            Some(cluster1) => {
                debug!("get FAT32 root at cluster {}",cluster1);
                let buf = self.cluster_chain_data(cluster1)?;
                Directory::from_bytes(&buf)
            },
            None => {
                let [beg,end] = self.boot_sector.root_dir_sec_rng();
                debug!("get FAT{} root at volume sector {}",self.boot_sector.fat_type(),beg);
                let sec_size = self.boot_sector.sec_size();
                let buf = self.img.read_at(self.offset + beg*sec_size,((end-beg)*sec_size) as usize)?;
                Directory::from_bytes(&buf)
            }
        };
        let vol_name = match root.find_label() {
            Some(entry) => entry.short_filename().unwrap_or("NO NAME".to_string()).replace(".",""),
            None => match self.boot_sector.label().len() {
                0 => "NO NAME".to_string(),
                _ => self.boot_sector.label()
            }
        };
        Ok((vol_name,root))
    }
    /// Return the full directory that starts at `cluster1`.
    pub fn directory_at(&mut self,cluster1: u64) -> Result<Directory,DYNERR> {
        let buf = self.cluster_chain_data(cluster1)?;
        Ok(Directory::from_bytes(&buf))
    }
}
