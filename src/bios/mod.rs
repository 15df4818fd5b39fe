//! # BIOS Structures Module
//!
//! This module contains the on-disk structures that sit below the file system proper:
//! byte decoding primitives, the FAT BIOS parameter block, the file allocation table
//! itself, and the NTFS boot record.  The `fs` modules make use of these while managing
//! the overall file system; nothing in here touches an image directly.

pub mod bytes;
pub mod bpb;
pub mod fat;
pub mod ntfs;
