//! ### FAT Deleted File Recovery
//!
//! Heuristic recovery of deleted directory entries.  Deletion only flips the first
//! name byte to 0xE5 and frees the FAT chain, so the metadata and often the data
//! are still there.  The catch on FAT32 is that deletion may zero the start
//! cluster's high word, which has to be guessed back.
//!
//! Every heuristic failure yields zero candidates, never an error; a recovery run
//! on a hopeless entry is a no-op.

use std::io::Write;
use std::path::Path;
use log::{debug,info,warn};
use super::Disk;
use super::directory::FileEntry;
use crate::DYNERR;

/// How to search for the FAT32 start-cluster high word.
#[derive(PartialEq,Eq,Clone,Copy,Debug)]
pub enum HiWordStrategy {
    /// only the caller's hint
    SingleHint,
    /// the hint, then hint+1
    HintThenNext,
    /// the hint, hint+1, then every possible high word, one candidate file per success
    Exhaustive
}

/// Policy knobs for the recovery heuristics.
pub struct RecoveryConfig {
    /// reject chains containing an all-zero cluster
    pub veto_all_zero_clusters: bool,
    /// reject chains whose trailing RAM slack is all zero
    pub veto_all_zero_ram_slack: bool,
    pub hi_word_strategy: HiWordStrategy
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            veto_all_zero_clusters: true,
            veto_all_zero_ram_slack: true,
            hi_word_strategy: HiWordStrategy::Exhaustive
        }
    }
}

/// A file is definitely not recoverable if it is not deleted, is a long filename
/// fragment, has a zero start cluster (FAT12/16), or the start cluster is in use.
/// On FAT32 the in-use test only means something when the high word survived.
pub fn definitely_not_recoverable(disk: &mut Disk,fe: &FileEntry) -> Result<bool,DYNERR> {
    if !fe.is_deleted() {
        return Ok(true);
    }
    if fe.has_long_filename() {
        return Ok(true);
    }
    let start = match fe.start_cluster() {
        Some(c) => c,
        None => return Ok(true)
    };
    let fat32 = disk.is_fat32();
    if !fat32 && start==0 {
        return Ok(true);
    }
    if !fat32 && !disk.is_free_cluster(start)? {
        return Ok(true);
    }
    if fat32 && start/65536 > 0 && !disk.is_free_cluster(start)? {
        return Ok(true);
    }
    Ok(false)
}

/// A file is definitely recoverable if it fits in one cluster and the start
/// cluster is unallocated; the contents still live where the directory entry
/// points.  On FAT32 this requires a surviving high word.
pub fn definitely_recoverable(disk: &mut Disk,fe: &FileEntry) -> Result<bool,DYNERR> {
    if !fe.is_deleted() || !fe.has_short_filename() {
        return Ok(false);
    }
    let start = match fe.start_cluster() {
        Some(c) => c,
        None => return Ok(false)
    };
    let size = fe.file_size().unwrap_or(0);
    let cluster_size = disk.cluster_size();
    let fat32 = disk.is_fat32();
    if !fat32 && size <= cluster_size && start != 0 && disk.is_free_cluster(start)? {
        return Ok(true);
    }
    if fat32 && start/65536 > 0 && size <= cluster_size && disk.is_free_cluster(start)? {
        return Ok(true);
    }
    Ok(false)
}

/// Candidate cluster chain for the given high word.  For FAT12/16 the high word
/// should just be zero.  The walk collects unallocated clusters forward from the
/// reconstructed start until enough are found or the data area ends, then the
/// configured vetoes get a chance to reject the chain.
fn candidate_chain(disk: &mut Disk,fe: &FileEntry,hi: u64,cfg: &RecoveryConfig) -> Result<Vec<u64>,DYNERR> {
    let size = fe.file_size().unwrap_or(0);
    let cluster_size = disk.cluster_size();
    let mut clusters = size / cluster_size;
    if size % cluster_size != 0 {
        clusters += 1;
    }
    let ram_slack = 512 - size % 512;
    let file_slack_secs = (cluster_size - size % cluster_size) / 512;
    let start = match fe.start_cluster() {
        Some(c) => (c & 0xffff) + hi*65536,
        None => return Ok(Vec::new())
    };
    let max_cluster = disk.boot_sector().max_cluster();
    if start >= max_cluster || !disk.is_free_cluster(start)? {
        return Ok(Vec::new());
    }
    let mut chain: Vec<u64> = Vec::new();
    for c in start..max_cluster {
        if disk.is_free_cluster(c)? {
            chain.push(c);
        }
        if chain.len() >= clusters as usize {
            break;
        }
    }
    if (chain.len() as u64) < clusters {
        debug!("data area exhausted before {} clusters were found",clusters);
        return Ok(Vec::new());
    }
    if cfg.veto_all_zero_clusters {
        for c in chain.iter() {
            let data = disk.read_cluster(*c)?;
            if data.iter().all(|b| *b==0) {
                debug!("vetoing chain with all-zero cluster {}",c);
                return Ok(Vec::new());
            }
        }
    }
    if cfg.veto_all_zero_ram_slack && clusters > 0 {
        let last = chain[clusters as usize - 1];
        let slack_off = disk.volume_offset()
            + disk.boot_sector().offset_from_cluster(last+1)
            - 512*file_slack_secs - ram_slack;
        let slack = disk.img_read(slack_off,ram_slack as usize)?;
        if slack.iter().all(|b| *b==0) {
            debug!("vetoing chain with all-zero RAM slack after cluster {}",last);
            return Ok(Vec::new());
        }
    }
    Ok(chain)
}

/// write the chain's data, truncated to the recorded size
fn write_chain(disk: &mut Disk,chain: &[u64],size: u64,path: &Path) -> Result<(),DYNERR> {
    let mut remaining = size;
    let mut out = std::fs::File::create(path)?;
    for c in chain {
        let data = disk.read_cluster(*c)?;
        let take = std::cmp::min(remaining,data.len() as u64) as usize;
        out.write_all(&data[0..take])?;
        remaining -= take as u64;
        if remaining==0 {
            break;
        }
    }
    Ok(())
}

/// Attempt to recover the file behind one deleted entry into `out_dir`.
/// `hi_guess` is the caller's best guess at the FAT32 high word, typically the
/// directory's own start cluster divided by 65536.  Returns the count of
/// candidate files written; FAT32 exhaustive searches may write several,
/// suffixed with the candidate ordinal.
pub fn recover_file(disk: &mut Disk,fe: &FileEntry,out_dir: &Path,hi_guess: u64,cfg: &RecoveryConfig) -> Result<usize,DYNERR> {
    if definitely_not_recoverable(disk,fe)? {
        return Ok(0);
    }
    let fname = match fe.short_filename() {
        Some(n) => n,
        None => return Ok(0)
    };
    let size = fe.file_size().unwrap_or(0);
    if definitely_recoverable(disk,fe)? {
        let start = fe.start_cluster().expect("checked by classifier");
        info!("recovering single cluster file {}",fname);
        write_chain(disk,&[start],size,&out_dir.join(&fname))?;
        return Ok(1);
    }
    if disk.is_fat32() {
        let hints: Vec<u64> = match cfg.hi_word_strategy {
            HiWordStrategy::SingleHint => vec![hi_guess],
            _ => vec![hi_guess,hi_guess+1]
        };
        for hi in hints {
            let chain = candidate_chain(disk,fe,hi,cfg)?;
            if !chain.is_empty() {
                info!("recovering {} with high word {}",fname,hi);
                write_chain(disk,&chain,size,&out_dir.join(&fname))?;
                return Ok(1);
            }
        }

        if cfg.hi_word_strategy != HiWordStrategy::Exhaustive {
            return Ok(0);
        }
        // getting desperate, cycle through every possible high word
        warn!("hints failed for {}, cycling high words",fname);
        let mut candidates = 0;
        let hi_count = disk.boot_sector().cluster_count() / 65536;
        for hi in 0..hi_count {
            let chain = candidate_chain(disk,fe,hi,cfg)?;
            if !chain.is_empty() {
                candidates += 1;
                let path = out_dir.join(format!("{}{}",fname,candidates));
                info!("recovering candidate {} of {} with high word {}",candidates,fname,hi);
                write_chain(disk,&chain,size,&path)?;
            }
        }
        Ok(candidates)
    } else {
        let chain = candidate_chain(disk,fe,0,cfg)?;
        if chain.is_empty() {
            return Ok(0);
        }
        info!("recovering {}",fname);
        write_chain(disk,&chain,size,&out_dir.join(&fname))?;
        Ok(1)
    }
}
