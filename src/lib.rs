//! # `dfkit` main library
//!
//! This library analyzes raw disk images for forensic purposes.  Everything is strictly
//! read-only: we parse partition tables and file system structures, we never repair them.
//!
//! ## Architecture
//!
//! Disk operations are built around a small set of layers:
//! * `img::Image` is a random-access byte source, usually a raw image file
//! * `part` discovers partitions (MBR primaries, EBR chains, GPT) and builds mount plans
//! * `bios` holds the on-disk structures: boot sectors, the FAT itself, byte primitives
//! * `fs` imposes a file system view on a partition and drives extraction
//! * `carve` streams windows of sectors past magic-number matchers
//!
//! When a `fs::fat::Disk` or `fs::ntfs::Volume` is created it takes ownership of some
//! `Image` and uses it as storage for the rest of the session.
//!
//! ## File Systems
//!
//! As of this writing `dfkit` understands
//! * FAT12/16/32, including long filenames and heuristic recovery of deleted files
//! * NTFS, including alternate data streams, $I30 indexes, and attribute lists
//!
//! exFAT and ReFS are out of scope, as are all write paths, journal replay, and
//! encrypted or compressed content.

pub mod img;
pub mod bios;
pub mod part;
pub mod fs;
pub mod carve;
pub mod commands;

use std::fmt::Write;
use log::debug;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Open a raw image file as an `Image` trait object.
pub fn open_image(img_path: &str) -> Result<Box<dyn img::Image>,DYNERR> {
    debug!("opening image {}",img_path);
    let file = img::FileImage::open(img_path)?;
    Ok(Box::new(file))
}

/// Display binary to stdout in columns of hex and ascii
pub fn display_block(start_addr: u64,block: &[u8]) {
    let mut slice_start = 0;
    loop {
        let row_label = start_addr + slice_start as u64;
        let mut slice_end = slice_start + 16;
        if slice_end > block.len() {
            slice_end = block.len();
        }
        let slice = block[slice_start..slice_end].to_vec();
        let txt: Vec<u8> = slice.iter().map(|c| match *c {
            x if x<32 => '.' as u8,
            x if x<127 => x,
            _ => '.' as u8
        }).collect();
        let mut row = String::new();
        write!(&mut row,"{:010X} : ",row_label).expect("unreachable");
        for byte in slice {
            write!(&mut row,"{:02X} ",byte).expect("unreachable");
        }
        for _blank in slice_end..slice_start+16 {
            row += "   ";
        }
        println!("{}|{}|",row,String::from_utf8_lossy(&txt));
        slice_start += 16;
        if slice_end==block.len() {
            break;
        }
    }
}
