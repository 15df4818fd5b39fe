//! # File System Module
//!
//! File system modules interpret a partition's contents.  There is a sub-module for
//! each supported family: `fat` for FAT12/16/32 and `ntfs` for NTFS.  A file system
//! object takes ownership of an `img::Image` and borrows it for every read; nothing
//! is ever written back to the image.
//!
//! Parsers are pure in the sense of error policy: they surface an error kind to the
//! caller and never abort the process.  The extraction pipelines decide which kinds
//! are fatal and which are logged and skipped.

pub mod fat;
pub mod ntfs;

/// Enumerates file system errors.  The `Display` trait will print the equivalent long message.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("unsupported feature")]
    Unsupported,
    #[error("corrupt structure")]
    Corrupt,
    #[error("not applicable")]
    NotApplicable,
    #[error("fragmented MFT")]
    FragmentedMft
}
