//! ### chunk subcommand
//!
//! Reads raw sectors and either hexdumps them to a terminal or streams the
//! bytes when stdout is piped onward.

use std::io::Write;
use crate::STDRESULT;

pub fn chunk(cmd: &clap::ArgMatches) -> STDRESULT {
    let (_path,mut img) = super::get_image(cmd)?;
    let offset = super::get_u64(cmd,"offset",0)?;
    let count = super::get_u64(cmd,"count",1)? as usize;
    let buf = img.read_sectors(offset,count)?;
    match atty::is(atty::Stream::Stdout) {
        true => crate::display_block(offset*512,&buf),
        false => std::io::stdout().write_all(&buf).expect("could not write stdout")
    }
    Ok(())
}
