//! ### carve subcommand
//!
//! Streams windows of sectors past the magic-number matchers and reports
//! where interesting content begins.

use log::error;
use crate::carve;
use crate::STDRESULT;

pub fn carve(cmd: &clap::ArgMatches) -> STDRESULT {
    let (_path,mut img) = super::get_image(cmd)?;
    let offset = super::get_u64(cmd,"offset",0)?;
    let window = super::get_u64(cmd,"cluster",1)? as usize;
    let list = cmd.get_one::<String>("search").expect("search argument is required");
    let finders = carve::finders_from_list(list);
    if finders.is_empty() {
        error!("no valid search types in `{}`",list);
        return Err(Box::new(super::CommandError::InvalidCommand));
    }
    let matches = carve::scan(img.as_mut(),offset,window,&finders)?;
    for m in &matches {
        println!("Matching {} found at offset 0x{:X}, sector {}",m.file_type,m.offset,m.sector);
    }
    Ok(())
}
