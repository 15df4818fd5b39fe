//! # CLI Subcommands
//!
//! Contains modules that run the subcommands.

pub mod scan;
pub mod fat;
pub mod ntfs;
pub mod carve;
pub mod chunk;
pub mod completions;

use std::str::FromStr;
use log::error;
use crate::img::Image;
use crate::DYNERR;

#[derive(thiserror::Error,Debug)]
pub enum CommandError {
    #[error("Command could not be interpreted")]
    InvalidCommand,
    #[error("One of the parameters was out of range")]
    OutOfRange,
    #[error("File not found")]
    FileNotFound
}

/// Open the image named by `-f`, failing up front when the file is missing.
pub(crate) fn get_image(cmd: &clap::ArgMatches) -> Result<(String,Box<dyn Image>),DYNERR> {
    let path = cmd.get_one::<String>("file").expect("file argument is required").clone();
    if !std::path::Path::new(&path).is_file() {
        error!("File {} cannot be opened for reading",path);
        return Err(Box::new(CommandError::FileNotFound));
    }
    Ok((path.clone(),crate::open_image(&path)?))
}

/// parse a numeric option, with a default when absent
pub(crate) fn get_u64(cmd: &clap::ArgMatches,id: &str,default: u64) -> Result<u64,DYNERR> {
    match cmd.get_one::<String>(id) {
        Some(s) => Ok(u64::from_str(s)?),
        None => Ok(default)
    }
}
