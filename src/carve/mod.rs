//! # Carve Module
//!
//! Content sniffing over raw sectors: stream fixed-size windows past a set of
//! match predicates and report where interesting file types begin.  This finds
//! files in unallocated space that no directory points at anymore.
//!
//! The predicates are deliberately small magic-number matchers behind the
//! `Finder` trait; a libmagic-backed matcher can slot in behind the same trait
//! if a host wants richer identification.

use log::debug;
use crate::img::Image;
use crate::DYNERR;

/// OLE compound document header, shared by the legacy Office formats
const OLE_MAGIC: [u8;8] = [0xd0,0xcf,0x11,0xe0,0xa1,0xb1,0x1a,0xe1];

/// A match predicate over one window of sectors.
pub trait Finder {
    fn matches(&self,window: &[u8]) -> bool;
    fn file_type(&self) -> &'static str;
}

pub struct JpegFinder;
impl Finder for JpegFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.len() >= 3 && window[0..3]==[0xff,0xd8,0xff]
    }
    fn file_type(&self) -> &'static str {
        "JPEG"
    }
}

pub struct PngFinder;
impl Finder for PngFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"\x89PNG\r\n\x1a\n")
    }
    fn file_type(&self) -> &'static str {
        "PNG"
    }
}

pub struct GifFinder;
impl Finder for GifFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"GIF87a") || window.starts_with(b"GIF89a")
    }
    fn file_type(&self) -> &'static str {
        "GIF"
    }
}

pub struct BmpFinder;
impl Finder for BmpFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"BM")
    }
    fn file_type(&self) -> &'static str {
        "Bitmap"
    }
}

/// matches any of the image types
pub struct ImageFinder {
    finders: Vec<Box<dyn Finder>>
}

impl ImageFinder {
    pub fn new() -> Self {
        Self {
            finders: vec![
                Box::new(JpegFinder),
                Box::new(PngFinder),
                Box::new(GifFinder),
                Box::new(BmpFinder)
            ]
        }
    }
}

impl Finder for ImageFinder {
    fn matches(&self,window: &[u8]) -> bool {
        self.finders.iter().any(|f| f.matches(window))
    }
    fn file_type(&self) -> &'static str {
        "Image"
    }
}

pub struct PdfFinder;
impl Finder for PdfFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"%PDF")
    }
    fn file_type(&self) -> &'static str {
        "PDF"
    }
}

pub struct ExeFinder;
impl Finder for ExeFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"MZ")
    }
    fn file_type(&self) -> &'static str {
        "Executable"
    }
}

pub struct ZipFinder;
impl Finder for ZipFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(b"PK\x03\x04") || window.starts_with(b"PK\x05\x06") || window.starts_with(b"PK\x07\x08")
    }
    fn file_type(&self) -> &'static str {
        "Zip"
    }
}

pub struct DocFinder;
impl Finder for DocFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(&OLE_MAGIC)
    }
    fn file_type(&self) -> &'static str {
        "Word"
    }
}

pub struct XlsFinder;
impl Finder for XlsFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(&OLE_MAGIC)
    }
    fn file_type(&self) -> &'static str {
        "Excel"
    }
}

pub struct PptFinder;
impl Finder for PptFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(&OLE_MAGIC)
    }
    fn file_type(&self) -> &'static str {
        "Powerpoint"
    }
}

/// any legacy Office document
pub struct OfcFinder;
impl Finder for OfcFinder {
    fn matches(&self,window: &[u8]) -> bool {
        window.starts_with(&OLE_MAGIC)
    }
    fn file_type(&self) -> &'static str {
        "Office"
    }
}

/// Build finders from a comma separated list of type keys.
/// Unknown keys are skipped with a log message.
pub fn finders_from_list(list: &str) -> Vec<Box<dyn Finder>> {
    let mut ans: Vec<Box<dyn Finder>> = Vec::new();
    for key in list.split(',') {
        match key.trim() {
            "jpeg" | "jpg" => ans.push(Box::new(JpegFinder)),
            "png" => ans.push(Box::new(PngFinder)),
            "gif" => ans.push(Box::new(GifFinder)),
            "bmp" => ans.push(Box::new(BmpFinder)),
            "img" | "image" => ans.push(Box::new(ImageFinder::new())),
            "pdf" => ans.push(Box::new(PdfFinder)),
            "exe" => ans.push(Box::new(ExeFinder)),
            "zip" => ans.push(Box::new(ZipFinder)),
            "doc" | "word" => ans.push(Box::new(DocFinder)),
            "xls" | "excel" => ans.push(Box::new(XlsFinder)),
            "ppt" | "powerpoint" => ans.push(Box::new(PptFinder)),
            "ofc" | "office" => ans.push(Box::new(OfcFinder)),
            other => debug!("no finder for search key `{}`",other)
        }
    }
    ans
}

/// one window that matched some finder
pub struct Match {
    pub offset: u64,
    pub sector: u64,
    pub file_type: &'static str
}

/// Stream windows of `window_secs` sectors from `offset_secs` to the end of the
/// image, reporting the first finder that matches each window.
pub fn scan(img: &mut dyn Image,offset_secs: u64,window_secs: usize,finders: &[Box<dyn Finder>]) -> Result<Vec<Match>,DYNERR> {
    let total = img.len()?;
    let window = 512 * window_secs;
    let mut ans: Vec<Match> = Vec::new();
    let mut pos = offset_secs * 512;
    while pos < total {
        let n = std::cmp::min(window as u64,total - pos) as usize;
        let buf = img.read_at(pos,n)?;
        for finder in finders {
            if finder.matches(&buf) {
                ans.push(Match {
                    offset: pos,
                    sector: pos / 512,
                    file_type: finder.file_type()
                });
                break;
            }
        }
        pos += window as u64;
    }
    Ok(ans)
}
