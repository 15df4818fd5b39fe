//! ### File Allocation Table (FAT)
//!
//! Module for reading the FAT on FAT volumes.  The entire FAT is buffered, analysis
//! never writes it back.
//!
//! The FAT can be thought of as a cluster pool with forward links.  A cluster value
//! tells us the state of the cluster (free or in use), and when in use, whether this
//! is the last cluster of its chain or where the next cluster is.  The first two
//! entries are reserved, so the first data cluster is cluster 2.
//!
//! FAT12 packs two entries into every 3 bytes.  FAT32 entries are really 28 bits,
//! the top nibble is masked off on read.

use log::trace;

// end of cluster chain (EOC); if the entry is >= the value it is EOC
const EOC12_MIN: u32 = 0xff8;
const EOC16_MIN: u32 = 0xfff8;
const EOC32_MIN: u32 = 0xffffff8;

const FREE_CLUSTER: u32 = 0;
pub const FIRST_DATA_CLUSTER: u64 = 2;

/// The FAT as a byte blob plus the bits-per-entry variant.
/// Cluster arguments out of range read as absent entries.
pub struct Fat {
    typ: usize,
    buf: Vec<u8>,
    total_clusters: u64
}

impl Fat {
    /// `typ` = bits per FAT entry (12, 16, 32); `total_clusters` bounds chain walks
    pub fn new(buf: Vec<u8>,typ: usize,total_clusters: u64) -> Self {
        Self { typ, buf, total_clusters }
    }
    pub fn fat_bits(&self) -> usize {
        self.typ
    }
    pub fn total_clusters(&self) -> u64 {
        self.total_clusters
    }
    /// raw value of the cell for cluster `n`, or None if the FAT does not cover it
    pub fn entry(&self,n: u64) -> Option<u32> {
        let n = n as usize;
        match self.typ {
            12 => {
                let offset = n + n/2;
                if offset+1 >= self.buf.len() {
                    return None;
                }
                let val16 = u16::from_le_bytes([self.buf[offset],self.buf[offset+1]]);
                match n & 1 {
                    1 => Some((val16 >> 4) as u32),
                    _ => Some((val16 & 0x0fff) as u32)
                }
            },
            16 => {
                let offset = n*2;
                if offset+1 >= self.buf.len() {
                    return None;
                }
                Some(u16::from_le_bytes([self.buf[offset],self.buf[offset+1]]) as u32)
            },
            32 => {
                let offset = n*4;
                if offset+3 >= self.buf.len() {
                    return None;
                }
                Some(u32::from_le_bytes(self.buf[offset..offset+4].try_into().expect("bounds")) & 0x0fffffff)
            },
            _ => panic!("unexpected FAT type {}",self.typ)
        }
    }
    /// cluster has no content at all
    pub fn is_free(&self,n: u64) -> bool {
        self.entry(n)==Some(FREE_CLUSTER)
    }
    /// entry is in the variant's end-of-chain range
    pub fn is_end(&self,n: u64) -> bool {
        let val = match self.entry(n) {
            Some(v) => v,
            None => return true
        };
        match self.typ {
            12 => val >= EOC12_MIN,
            16 => val >= EOC16_MIN,
            32 => val >= EOC32_MIN,
            _ => panic!("unexpected FAT type {}",self.typ)
        }
    }
    /// allocated and pointing onward
    pub fn is_allocated(&self,n: u64) -> bool {
        match self.entry(n) {
            Some(v) => v != FREE_CLUSTER && !self.is_end(n),
            None => false
        }
    }
    /// next cluster in the chain, None when free, at the end, or out of range
    pub fn next_cluster(&self,n: u64) -> Option<u64> {
        match self.entry(n) {
            Some(FREE_CLUSTER) => None,
            Some(val) if self.is_end(n) => {
                trace!("cluster {} ends its chain with {:X}",n,val);
                None
            },
            Some(val) => Some(val as u64),
            None => None
        }
    }
    /// Clusters making up the chain starting at `start`.  The walk is bounded by
    /// the total cluster count so a corrupt circular FAT cannot loop forever.
    pub fn chain(&self,start: u64) -> Vec<u64> {
        let mut ans: Vec<u64> = Vec::new();
        let mut curr = start;
        for _i in 0..=self.total_clusters {
            match self.entry(curr) {
                None | Some(FREE_CLUSTER) => return ans,
                Some(_) => {
                    ans.push(curr);
                    match self.next_cluster(curr) {
                        Some(next) => curr = next,
                        None => return ans
                    }
                }
            }
        }
        ans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fat12_nibbles() {
        // entries: [0]=0xf80, [1]=0xfff, [2]=0x003, [3]=0xfff
        let buf = vec![0x80,0xff,0xff,0x03,0xf0,0xff];
        let fat = Fat::new(buf,12,16);
        assert_eq!(fat.entry(0),Some(0xf80));
        assert_eq!(fat.entry(1),Some(0xfff));
        assert_eq!(fat.entry(2),Some(0x003));
        assert_eq!(fat.entry(3),Some(0xfff));
        assert!(fat.is_end(3));
        assert_eq!(fat.chain(2),vec![2,3]);
    }

    #[test]
    fn fat16_chain() {
        let mut buf = vec![0;32];
        // 2 -> 3 -> 4 -> EOC, 6 free
        buf[4..6].copy_from_slice(&u16::to_le_bytes(3));
        buf[6..8].copy_from_slice(&u16::to_le_bytes(4));
        buf[8..10].copy_from_slice(&u16::to_le_bytes(0xffff));
        let fat = Fat::new(buf,16,16);
        assert_eq!(fat.chain(2),vec![2,3,4]);
        assert!(fat.is_free(6));
        assert!(!fat.is_allocated(4));
        assert!(fat.is_end(4));
        assert!(fat.is_allocated(2));
        assert_eq!(fat.chain(6),Vec::<u64>::new());
    }

    #[test]
    fn fat32_mask_and_cycle() {
        let mut buf = vec![0;64];
        // 2 -> 3 -> 2 circular chain, top nibble set to verify the mask
        buf[8..12].copy_from_slice(&u32::to_le_bytes(0xf0000003));
        buf[12..16].copy_from_slice(&u32::to_le_bytes(0x00000002));
        let fat = Fat::new(buf,32,8);
        assert_eq!(fat.entry(2),Some(3));
        // bounded walk terminates even though the chain is circular
        let chain = fat.chain(2);
        assert!(chain.len() <= 9);
    }

    #[test]
    fn out_of_range() {
        let fat = Fat::new(vec![0;8],16,4);
        assert_eq!(fat.entry(100),None);
        assert!(!fat.is_free(100));
        assert!(fat.is_end(100));
        assert_eq!(fat.chain(100),Vec::<u64>::new());
    }
}
