//! ### FAT subcommands
//!
//! `catalog` lists a directory on a FAT volume, root by default or any
//! directory given its first cluster.  `recover` lists the deleted entries of
//! a directory, classifies them, and writes out whatever the heuristics can
//! reconstruct.

use std::path::Path;
use log::warn;
use crate::fs::fat::{pack,recover,Disk};
use crate::fs::fat::directory::{Directory,FileEntry};
use crate::STDRESULT;

fn entry_line(fe: &FileEntry) -> String {
    let attrs = match fe.attributes() {
        Some(a) => pack::attr_string(a),
        None => "......".to_string()
    };
    let size = match fe.directory() {
        true => "<DIR>".to_string(),
        false => fe.file_size().unwrap_or(0).to_string()
    };
    let prefix = match fe.is_deleted() {
        true => "<DEL> ",
        false => ""
    };
    let name = match (fe.long_filename(),fe.short_filename()) {
        (Some(long),Some(short)) => format!("{} ({})",long,short),
        (Some(long),None) => long,
        (None,Some(short)) => short,
        _ => "<empty>".to_string()
    };
    format!("{} {:>10} {:>8} {}{}",attrs,size,fe.start_cluster().unwrap_or(0),prefix,name)
}

pub fn catalog(cmd: &clap::ArgMatches) -> STDRESULT {
    let (_path,img) = super::get_image(cmd)?;
    let offset = super::get_u64(cmd,"offset",0)?;
    let mut disk = Disk::from_img(img,offset)?;
    let boot = disk.boot_sector();
    println!("Volume type {} serial {:08X}",boot.fs_type_string(),boot.serial());
    println!("Total sectors: {}",boot.tot_sec());
    let dir: Directory;
    match cmd.get_one::<String>("cluster") {
        Some(s) => {
            let cluster = s.parse::<u64>()?;
            dir = disk.directory_at(cluster)?;
            println!("Directory at cluster {}",cluster);
        },
        None => {
            let (label,root) = disk.root_directory()?;
            println!("Volume label: {}",label);
            dir = root;
        }
    }
    for fe in dir.iter() {
        let stamp = match (fe.modify_date(),fe.modify_time()) {
            (Some(d),Some(t)) => format!("{} {} ",d.format("%Y-%m-%d"),t.format("%H:%M:%S")),
            _ => "                    ".to_string()
        };
        println!("{}{}",stamp,entry_line(fe));
    }
    println!("{} entries",dir.entries());
    Ok(())
}

pub fn recover(cmd: &clap::ArgMatches) -> STDRESULT {
    let (_path,img) = super::get_image(cmd)?;
    let offset = super::get_u64(cmd,"offset",0)?;
    let cluster = super::get_u64(cmd,"cluster",0)?;
    let out_dir = match cmd.get_one::<String>("dir") {
        Some(d) => d.clone(),
        None => ".".to_string()
    };
    let mut disk = Disk::from_img(img,offset)?;
    let dir = match cluster {
        0 => disk.root_directory()?.1,
        c => disk.directory_at(c)?
    };
    let hi_guess = super::get_u64(cmd,"hiword",cluster/65536)?;
    let cfg = recover::RecoveryConfig {
        veto_all_zero_clusters: !cmd.get_flag("keep-zero-clusters"),
        veto_all_zero_ram_slack: !cmd.get_flag("keep-zero-slack"),
        hi_word_strategy: match cmd.get_one::<String>("strategy").map(|s| s.as_str()) {
            Some("hint") => recover::HiWordStrategy::SingleHint,
            Some("next") => recover::HiWordStrategy::HintThenNext,
            _ => recover::HiWordStrategy::Exhaustive
        }
    };
    let mut total = 0;
    let mut examined = 0;
    for fe in dir.iter() {
        if !fe.is_deleted() {
            continue;
        }
        examined += 1;
        println!("{}",entry_line(fe));
        if fe.has_short_filename() {
            println!("\tDefinitelyNotRecoverable: {}",recover::definitely_not_recoverable(&mut disk,fe)?);
            println!("\tDefinitelyRecoverable: {}",recover::definitely_recoverable(&mut disk,fe)?);
        }
        match recover::recover_file(&mut disk,fe,Path::new(&out_dir),hi_guess,&cfg) {
            Ok(n) => total += n,
            Err(e) => warn!("recovery attempt failed: {}",e)
        }
    }
    println!("{} deleted entries examined, {} candidate files written",examined,total);
    Ok(())
}
