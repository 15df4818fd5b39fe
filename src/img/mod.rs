//! # Image Module
//!
//! A disk image is represented by an object implementing the `Image` trait, which is
//! nothing more than a read-only random-access byte source.  File systems take ownership
//! of an `Image` and use it as storage; partition scanners merely borrow one.
//!
//! Whole-image interpretation (partition tables, boot sectors) is handled elsewhere,
//! this layer only moves bytes.  Every read either returns exactly the requested
//! number of bytes or an error; the caller never sees a silent short read.

use std::io::{Read,Seek,SeekFrom};
use crate::DYNERR;

/// Enumerates image access errors.  The `Display` trait will print the equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("read out of bounds")]
    OutOfBounds,
    #[error("short read")]
    ShortRead
}

/// Read-only random access byte source.
/// Sectors are always 512 bytes at this level; file systems impose their own sizes above.
pub trait Image {
    /// Total length of the image in bytes
    fn len(&mut self) -> Result<u64,DYNERR>;
    /// Read exactly `n` bytes starting at byte `offset`
    fn read_at(&mut self,offset: u64,n: usize) -> Result<Vec<u8>,DYNERR>;
    /// Read whole 512-byte sectors
    fn read_sectors(&mut self,sector: u64,count: usize) -> Result<Vec<u8>,DYNERR> {
        self.read_at(sector*512,count*512)
    }
}

/// Image backed by a file on the host file system.
pub struct FileImage {
    file: std::fs::File
}

impl FileImage {
    pub fn open(path: &str) -> Result<Self,DYNERR> {
        Ok(Self {
            file: std::fs::File::open(path)?
        })
    }
}

impl Image for FileImage {
    fn len(&mut self) -> Result<u64,DYNERR> {
        Ok(self.file.metadata()?.len())
    }
    fn read_at(&mut self,offset: u64,n: usize) -> Result<Vec<u8>,DYNERR> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf: Vec<u8> = vec![0;n];
        match self.file.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind()==std::io::ErrorKind::UnexpectedEof => Err(Box::new(Error::ShortRead)),
            Err(e) => Err(Box::new(e))
        }
    }
}

/// Image backed by an in-memory buffer.  Used for pre-extracted streams
/// (such as a linearized MFT) and heavily by tests.
pub struct MemImage {
    buf: Vec<u8>
}

impl MemImage {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl Image for MemImage {
    fn len(&mut self) -> Result<u64,DYNERR> {
        Ok(self.buf.len() as u64)
    }
    fn read_at(&mut self,offset: u64,n: usize) -> Result<Vec<u8>,DYNERR> {
        let beg = offset as usize;
        if beg + n > self.buf.len() {
            return Err(Box::new(Error::OutOfBounds));
        }
        Ok(self.buf[beg..beg+n].to_vec())
    }
}

#[test]
fn mem_image_bounds() {
    let mut img = MemImage::new(vec![0;1024]);
    assert_eq!(img.len().unwrap(),1024);
    assert_eq!(img.read_at(512,512).unwrap().len(),512);
    assert!(img.read_at(1020,8).is_err());
}
