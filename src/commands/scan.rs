//! ### scan and mount subcommands
//!
//! `scan` identifies the partition scheme and lists every partition, with a
//! JSON mode for machine consumption.  `mount` prints the loopback mount plan
//! for each mountable partition; actually invoking the host mounter is left
//! to the caller.

use log::info;
use serde_json::json;
use crate::part::{self,Scheme};
use crate::STDRESULT;

fn type_string(part: &part::PartitionRef) -> String {
    match (part.type_code,&part.type_guid) {
        (Some(code),_) => format!("0x{:02X}",code),
        (None,Some(guid)) => guid.to_string(),
        _ => "unknown".to_string()
    }
}

pub fn scan(cmd: &clap::ArgMatches) -> STDRESULT {
    let (_path,mut img) = super::get_image(cmd)?;
    let (scheme,parts) = part::scan_partitions(img.as_mut())?;
    if cmd.get_flag("json") {
        let mut list: Vec<serde_json::Value> = Vec::new();
        for p in &parts {
            list.push(json!({
                "index": p.index,
                "type": type_string(p),
                "first_lba": p.first_lba,
                "sector_count": p.sector_count,
                "label": p.label,
                "mountable": p.is_mountable()
            }));
        }
        let ans = json!({
            "scheme": scheme.to_string(),
            "partitions": list
        });
        println!("{}",serde_json::to_string_pretty(&ans)?);
        return Ok(());
    }
    println!("{} partition table",scheme);
    if scheme==Scheme::Gpt {
        let header = part::gpt::read_header(img.as_mut())?;
        println!("disk GUID {}",header.disk_guid());
        println!("usable LBA range {}..{}",header.first_usable(),header.last_usable());
    }
    for p in &parts {
        let kind = match p.is_extended_container() {
            true => " (extended container)",
            false => match p.is_swap() {
                true => " (swap)",
                false => ""
            }
        };
        let label = match &p.label {
            Some(l) if l.len() > 0 => format!(" `{}`",l),
            _ => "".to_string()
        };
        println!("partition {}: type {}{} first LBA {} sectors {}{}",
            p.index,type_string(p),kind,p.first_lba,p.sector_count,label);
    }
    if parts.len()==0 {
        println!("no partitions found");
    }
    Ok(())
}

pub fn mount(cmd: &clap::ArgMatches) -> STDRESULT {
    let (path,mut img) = super::get_image(cmd)?;
    let (_scheme,parts) = part::scan_partitions(img.as_mut())?;
    let mut count = 0;
    for p in &parts {
        if p.is_swap() {
            info!("skipping swap partition");
            continue;
        }
        if p.is_extended_container() {
            info!("skipping extended container");
            continue;
        }
        match p.mount_plan(&path) {
            Some(plan) => {
                println!("{}",plan);
                count += 1;
            },
            None => info!("partition {} is not mountable",p.index)
        }
    }
    if count==0 {
        println!("nothing to mount");
    }
    Ok(())
}
