//! ### NTFS subcommands
//!
//! `record` pretty-prints one MFT entry with all of its attributes.  `extract`
//! reconstructs a file, its alternate data streams, or a directory's $I30
//! stream.  `timeline` walks a linearized MFT and emits MAC times as
//! semicolon-separated values.

use std::path::Path;
use chrono::{DateTime,Utc};
use log::{debug,warn};
use crate::fs::ntfs::{attr,extract,index,Volume};
use crate::fs::ntfs::attr::{Attribute,Payload};
use crate::fs::ntfs::mft::MftRecord;
use crate::STDRESULT;

fn open_volume(cmd: &clap::ArgMatches) -> Result<Volume,crate::DYNERR> {
    let (_path,img) = super::get_image(cmd)?;
    let offset = super::get_u64(cmd,"offset",0)?;
    let mut vol = Volume::from_img(img,offset)?;
    if let Some(mft_path) = cmd.get_one::<String>("mft") {
        debug!("using pre-extracted MFT {}",mft_path);
        vol.set_mft_stream(std::fs::read(mft_path)?);
    }
    Ok(vol)
}

fn record_summary(rec: &MftRecord) -> String {
    format!("MFT entry: {}/{}\n\tIn use: {}  Directory: {}\n\tSize: {}/{}\n\tBase Record: {}/{}",
        rec.record_number(),rec.sequence_number(),
        rec.in_use(),rec.is_directory(),
        rec.logical_size(),rec.physical_size(),
        rec.base_record_mft(),rec.base_record_seq())
}

fn describe_attribute(a: &Attribute) -> String {
    let mut ans = format!("Attribute Type: {:02X}\nTotal Length: {}\nResident: {}\nName: {}\nAttribute ID: {}",
        a.type_code(),a.total_length(),a.is_resident(),
        a.name().unwrap_or("None"),a.id());
    match &a.payload {
        Payload::StandardInfo(si) => {
            ans += &format!("\nCreated: {}\nModified: {}\nRec Changed: {}\nAccessed: {}\nFlags: {:04X}",
                si.created(),si.modified(),si.record_changed(),si.accessed(),si.flags());
        },
        Payload::FileName(fname) => {
            ans += &format!("\nFilename: {}\nParent MFT: {}/{}\nCreated: {}\nModified: {}\nRec Changed: {}\nAccessed: {}\nFlags: {:04X}\nExtended Flags: {:04X}",
                fname.name(),fname.parent_mft(),fname.parent_seq(),
                fname.created(),fname.modified(),fname.record_changed(),fname.accessed(),
                fname.flags(),fname.extended_flags());
        },
        Payload::AttributeList(items) => {
            ans += "\nAttribute List:";
            for item in items {
                ans += &format!("\n\ttype {:02X} stored in MFT {}/{} from VCN {}",
                    item.type_code,item.mft(),item.sequence_number(),item.start_vcn);
            }
        },
        Payload::Data(Some(_)) => {
            let n = a.resident_payload().map(|b| b.len()).unwrap_or(0);
            ans += &format!("\nData bytes: {}",n);
        },
        Payload::Data(None) => {
            ans += &format!("\nData runs: {}\nData clusters: {:?}",
                a.runs().map(|r| r.len()).unwrap_or(0),a.cluster_list());
        },
        Payload::IndexRoot(root) => {
            ans += &format!("\nIndexed Type: {:02X}\nIndex Entries: {}",root.indexed_type,root.entries.len());
            for e in &root.entries {
                if let Some(name) = e.filename() {
                    ans += &format!("\n\tMFT {}/{} {}",e.mft(),e.sequence_number(),name);
                }
            }
        },
        Payload::IndexAllocation => {
            ans += &format!("\nIndex Buffer Data runs: {}\nIndex Buffer Clusters: {:?}",
                a.runs().map(|r| r.len()).unwrap_or(0),a.cluster_list());
        },
        Payload::Bitmap(map) => {
            ans += &format!("\nBuffers in use/bitmap: {}/{}",map.buffers_in_use(),map.buffers_in_map());
        },
        Payload::Other => {}
    }
    ans
}

pub fn record(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut vol = open_volume(cmd)?;
    let entry = super::get_u64(cmd,"entry",0)?;
    let vbr = vol.vbr();
    println!("Volume serial {} with {} byte clusters, MFT at LCN {}",
        vbr.serial_string(),vbr.bytes_per_cluster(),vbr.mft_lcn());
    let rec = vol.record(entry)?;
    println!("{}",record_summary(&rec));
    for a in rec.attributes() {
        println!("{}",describe_attribute(&a));
    }
    Ok(())
}

pub fn extract(cmd: &clap::ArgMatches) -> STDRESULT {
    let mut vol = open_volume(cmd)?;
    let entry = super::get_u64(cmd,"entry",0)?;
    let out_dir = match cmd.get_one::<String>("dir") {
        Some(d) => d.clone(),
        None => ".".to_string()
    };
    let opts = extract::ExtractOptions {
        include_slack: cmd.get_flag("slack")
    };
    extract::extract_entry(&mut vol,entry,Path::new(&out_dir),&opts)
}

fn csv_stamp(t: &DateTime<Utc>) -> String {
    format!("{};{}",t.format("%Y-%m-%d"),t.format("%H:%M:%S"))
}

#[allow(clippy::too_many_arguments)]
fn csv_line(source: &str,access: DateTime<Utc>,modify: DateTime<Utc>,create: DateTime<Utc>,
    rec_change: DateTime<Utc>,mft: u64,seq: u16,attributes: u32,file_size: u64,alloc_size: u64,filename: &str) {
    println!("{};{};{};{};{};{};{};{};{};{};\"{}\"",
        source,csv_stamp(&access),csv_stamp(&modify),csv_stamp(&create),csv_stamp(&rec_change),
        mft,seq,attributes,file_size,alloc_size,filename);
}

pub fn timeline(cmd: &clap::ArgMatches) -> STDRESULT {
    let mft_path = cmd.get_one::<String>("mft").expect("mft argument is required");
    let stream = std::fs::read(mft_path)?;
    // the volume is only needed to chase index buffers
    let mut maybe_vol = match cmd.get_one::<String>("file") {
        Some(_) => Some(open_volume(cmd)?),
        None => None
    };
    println!("Source;AccessDate;AccessTime;ModifyDate;ModifyTime;CreateDate;CreateTime;RecordChangeDate;RecordChangeTime;MftEntry;UpdateSequence;Attributes;FileSize;AllocatedSize;Filename");
    let record_size = match &maybe_vol {
        Some(vol) => vol.record_size() as usize,
        None => 1024
    };
    let mut beg = 0;
    while beg + record_size <= stream.len() {
        let rec = match MftRecord::from_bytes(stream[beg..beg+record_size].to_vec()) {
            Ok(rec) => rec,
            Err(_) => {
                debug!("skipping undecodable record at offset {}",beg);
                beg += record_size;
                continue;
            }
        };
        beg += record_size;
        let filenames = rec.attributes_of_type(attr::FILE_NAME);
        if filenames.is_empty() {
            continue;
        }
        let mut best_name = String::new();
        let mut logical = 0;
        let mut physical = 0;
        for a in &filenames {
            if let Payload::FileName(fname) = &a.payload {
                csv_line("F",fname.accessed(),fname.modified(),fname.created(),fname.record_changed(),
                    rec.record_number(),rec.sequence_number(),fname.flags(),
                    fname.logical_size(),fname.physical_size(),fname.name());
                best_name = fname.name().to_string();
                logical = fname.logical_size();
                physical = fname.physical_size();
            }
        }
        for a in rec.attributes_of_type(attr::STANDARD_INFORMATION) {
            if let Payload::StandardInfo(si) = &a.payload {
                csv_line("S",si.accessed(),si.modified(),si.created(),si.record_changed(),
                    rec.record_number(),rec.sequence_number(),si.flags(),
                    logical,physical,&best_name);
            }
        }
        if rec.is_directory() {
            if let Some(vol) = maybe_vol.as_mut() {
                for alloc in rec.attributes_of_type(attr::INDEX_ALLOCATION) {
                    let buffer_size = vol.vbr().index_buffer_size() as usize;
                    let mut i30: Vec<u8> = Vec::new();
                    for lcn in alloc.cluster_list() {
                        i30.append(&mut vol.cluster(lcn)?);
                    }
                    let mut pos = 0;
                    while pos + buffer_size <= i30.len() {
                        match index::IndxBuffer::from_bytes(i30[pos..pos+buffer_size].to_vec()) {
                            Ok(indx) => {
                                for e in &indx.entries {
                                    if let Some(key) = &e.key {
                                        csv_line("I",key.accessed(),key.modified(),key.created(),key.record_changed(),
                                            e.mft(),e.sequence_number(),key.flags(),
                                            key.logical_size(),key.physical_size(),key.name());
                                    }
                                }
                            },
                            Err(e) => warn!("bad INDX buffer in record {} ({})",rec.record_number(),e)
                        }
                        pos += buffer_size;
                    }
                }
            }
        }
    }
    Ok(())
}
