//! ### Extraction Pipeline
//!
//! Reconstructs a file or directory from its MFT entry number and writes the
//! result to the host file system.
//!
//! Files can be spread across records: when a $20 ATTRIBUTE_LIST is present,
//! the $80 slices live in the records it points at, each covering a VCN range.
//! Slices are stitched back together in VCN order.  Named $80 attributes are
//! alternate data streams and come out as separate files.  Directories come
//! out as their raw $I30 stream, with INDX buffers filtered through the $B0
//! bitmap unless slack is requested.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use log::{info,warn};
use super::attr::{self,Attribute,Payload};
use super::Volume;
use crate::DYNERR;

/// Extraction knobs
#[derive(Default)]
pub struct ExtractOptions {
    /// keep INDX buffers the bitmap marks free (directory slack)
    pub include_slack: bool
}

/// Output names must be usable on a host file system: a leading '.' becomes
/// `root`, a leading '$' becomes `dollar`.
pub fn sanitize_name(name: &str) -> String {
    match name.chars().next() {
        Some('.') => "root".to_string(),
        Some('$') => format!("dollar{}",&name[1..]),
        _ => name.to_string()
    }
}

/// one output stream being assembled: resident bytes, or VCN-ranged cluster lists
#[derive(Default)]
struct StreamBuilder {
    resident: Option<Vec<u8>>,
    pieces: Vec<(u64,Vec<u64>)>
}

impl StreamBuilder {
    fn add(&mut self,a: &Attribute) {
        match a.resident_data() {
            Some(bytes) => self.resident = Some(bytes.to_vec()),
            None => self.pieces.push((a.first_vcn().unwrap_or(0),a.cluster_list()))
        }
    }
    /// clusters in VCN order
    fn cluster_list(&mut self) -> Vec<u64> {
        self.pieces.sort_by_key(|p| p.0);
        self.pieces.iter().flat_map(|p| p.1.clone()).collect()
    }
}

fn write_stream(vol: &mut Volume,builder: &mut StreamBuilder,path: &Path) -> Result<(),DYNERR> {
    let mut out = std::fs::File::create(path)?;
    match &builder.resident {
        Some(bytes) => out.write_all(bytes)?,
        None => {
            for lcn in builder.cluster_list() {
                out.write_all(&vol.cluster(lcn)?)?;
            }
        }
    }
    Ok(())
}

/// collect the $80 attributes for the target, chasing the attribute list when present
fn gather_data_attributes(vol: &mut Volume,rec: &super::mft::MftRecord) -> Result<Vec<Attribute>,DYNERR> {
    let lists = rec.attributes_of_type(attr::ATTRIBUTE_LIST);
    if lists.is_empty() {
        return Ok(rec.attributes_of_type(attr::DATA));
    }
    // order the holding records by the VCN range they cover
    let mut refs: Vec<(u64,u64)> = Vec::new();
    for list in &lists {
        if let Payload::AttributeList(items) = &list.payload {
            for item in items {
                if item.type_code==attr::DATA {
                    refs.push((item.start_vcn,item.mft()));
                }
            }
        }
    }
    refs.sort_by_key(|r| r.0);
    let mut mft_numbers: Vec<u64> = Vec::new();
    for (_vcn,mft_no) in refs {
        if !mft_numbers.contains(&mft_no) {
            mft_numbers.push(mft_no);
        }
    }
    let mut ans: Vec<Attribute> = Vec::new();
    for mft_no in mft_numbers {
        let holder = match mft_no==rec.record_number() {
            true => rec.attributes_of_type(attr::DATA),
            false => vol.record(mft_no)?.attributes_of_type(attr::DATA)
        };
        ans.extend(holder);
    }
    Ok(ans)
}

/// Extract MFT entry `entry` into `out_dir`.  Files come out under their longest
/// $30 name (sanitized), alternate data streams as `<name>-ads-<stream>`, and
/// directory indexes as `index-<name>`.
pub fn extract_entry(vol: &mut Volume,entry: u64,out_dir: &Path,opts: &ExtractOptions) -> Result<(),DYNERR> {
    let rec = vol.record(entry)?;
    // prefer the longest filename; namespaces make the DOS name shorter
    let mut fname: Option<String> = None;
    let mut fname_len = 0;
    let mut is_directory = false;
    for a in rec.attributes_of_type(attr::FILE_NAME) {
        if let Payload::FileName(fn_attr) = &a.payload {
            if fname.is_none() {
                is_directory = fn_attr.is_directory();
            }
            if fn_attr.name_len() > fname_len {
                fname_len = fn_attr.name_len();
                fname = Some(fn_attr.name().to_string());
            }
        }
    }
    let fname = match fname {
        Some(name) => sanitize_name(&name),
        None => {
            info!("record {} has no filename attribute, nothing to extract",entry);
            return Ok(());
        }
    };
    if is_directory {
        let mut cluster_list: Vec<u64> = Vec::new();
        for alloc in rec.attributes_of_type(attr::INDEX_ALLOCATION) {
            cluster_list.append(&mut alloc.cluster_list());
        }
        let bitmaps = rec.attributes_of_type(attr::BITMAP);
        if bitmaps.len() != 1 {
            warn!("expected one $B0 bitmap, found {}",bitmaps.len());
            return Ok(());
        }
        let bitmap = match &bitmaps[0].payload {
            Payload::Bitmap(map) => map,
            _ => {
                warn!("the $B0 attribute did not decode as a bitmap");
                return Ok(());
            }
        };
        info!("creating INDX file index-{}",fname);
        let mut out = std::fs::File::create(out_dir.join(format!("index-{}",fname)))?;
        for (i,lcn) in cluster_list.iter().enumerate() {
            if opts.include_slack || bitmap.in_use(i as u64) {
                out.write_all(&vol.cluster(*lcn)?)?;
            }
        }
        return Ok(());
    }
    // file branch
    let data_attrs = gather_data_attributes(vol,&rec)?;
    let mut default_stream = StreamBuilder::default();
    let mut ads: BTreeMap<String,StreamBuilder> = BTreeMap::new();
    for a in &data_attrs {
        match a.name() {
            Some(stream_name) => ads.entry(stream_name.to_string()).or_default().add(a),
            None => default_stream.add(a)
        }
    }
    info!("extracting file {}",fname);
    write_stream(vol,&mut default_stream,&out_dir.join(&fname))?;
    for (stream_name,mut builder) in ads {
        info!("extracting alternate data stream {} for file {}",stream_name,fname);
        write_stream(vol,&mut builder,&out_dir.join(format!("{}-ads-{}",fname,stream_name)))?;
    }
    Ok(())
}
