//! helpers shared by the integration tests: a sparse in-memory image and
//! builders for synthetic on-disk structures

#![allow(dead_code)]

use std::collections::BTreeMap;
use dfkit::img::Image;

type DYNERR = Box<dyn std::error::Error>;

/// Image that reads zeros everywhere except explicitly patched ranges.
/// Keeps multi-hundred-megabyte synthetic volumes cheap.
pub struct SparseImage {
    len: u64,
    patches: BTreeMap<u64,Vec<u8>>
}

impl SparseImage {
    pub fn new(len: u64) -> Self {
        Self { len, patches: BTreeMap::new() }
    }
    pub fn write(&mut self,offset: u64,bytes: &[u8]) {
        self.patches.insert(offset,bytes.to_vec());
    }
}

impl Image for SparseImage {
    fn len(&mut self) -> Result<u64,DYNERR> {
        Ok(self.len)
    }
    fn read_at(&mut self,offset: u64,n: usize) -> Result<Vec<u8>,DYNERR> {
        if offset + n as u64 > self.len {
            return Err("read out of bounds".into());
        }
        let mut ans = vec![0u8;n];
        for (patch_off,bytes) in &self.patches {
            let patch_end = patch_off + bytes.len() as u64;
            let read_end = offset + n as u64;
            if *patch_off < read_end && patch_end > offset {
                let src_beg = offset.saturating_sub(*patch_off) as usize;
                let dst_beg = patch_off.saturating_sub(offset) as usize;
                let count = std::cmp::min(patch_end,read_end) as usize
                    - std::cmp::max(*patch_off,offset) as usize;
                ans[dst_beg..dst_beg+count].copy_from_slice(&bytes[src_beg..src_beg+count]);
            }
        }
        Ok(ans)
    }
}

/// 16-byte MBR partition entry
pub fn mbr_entry(active: u8,typ: u8,first_lba: u32,count: u32) -> [u8;16] {
    let mut e: [u8;16] = [0;16];
    e[0] = active;
    e[4] = typ;
    e[8..12].copy_from_slice(&u32::to_le_bytes(first_lba));
    e[12..16].copy_from_slice(&u32::to_le_bytes(count));
    e
}

/// 512-byte MBR/EBR sector with up to 4 entries and a valid signature
pub fn mbr_sector(entries: &[[u8;16]]) -> Vec<u8> {
    let mut sec = vec![0u8;512];
    for (i,e) in entries.iter().enumerate() {
        sec[446+16*i..462+16*i].copy_from_slice(e);
    }
    sec[510] = 0x55;
    sec[511] = 0xaa;
    sec
}

/// FAT32 boot sector: 512 b/s, `spc` sectors per cluster, root at cluster 2
pub fn fat32_boot_sector(total_secs: u32,spc: u8,reserved: u16,fat_secs: u32) -> Vec<u8> {
    let mut buf = vec![0u8;512];
    buf[0..3].copy_from_slice(&[0xeb,0x58,0x90]);
    buf[3..11].copy_from_slice(b"MSDOS5.0");
    buf[11..13].copy_from_slice(&u16::to_le_bytes(512));
    buf[13] = spc;
    buf[14..16].copy_from_slice(&u16::to_le_bytes(reserved));
    buf[16] = 2;
    buf[21] = 0xf8;
    buf[32..36].copy_from_slice(&u32::to_le_bytes(total_secs));
    buf[36..40].copy_from_slice(&u32::to_le_bytes(fat_secs));
    buf[44..48].copy_from_slice(&u32::to_le_bytes(2));
    buf[48..50].copy_from_slice(&u16::to_le_bytes(1));
    buf[50..52].copy_from_slice(&u16::to_le_bytes(6));
    buf[71..82].copy_from_slice(b"NO NAME    ");
    buf[82..90].copy_from_slice(b"FAT32   ");
    buf[510] = 0x55;
    buf[511] = 0xaa;
    buf
}

/// FAT16 boot sector with a classic reserved-area root directory
pub fn fat16_boot_sector(total_secs: u16,spc: u8,reserved: u16,fat_secs: u16,root_entries: u16) -> Vec<u8> {
    let mut buf = vec![0u8;512];
    buf[0..3].copy_from_slice(&[0xeb,0x3c,0x90]);
    buf[3..11].copy_from_slice(b"MSDOS5.0");
    buf[11..13].copy_from_slice(&u16::to_le_bytes(512));
    buf[13] = spc;
    buf[14..16].copy_from_slice(&u16::to_le_bytes(reserved));
    buf[16] = 2;
    buf[17..19].copy_from_slice(&u16::to_le_bytes(root_entries));
    buf[19..21].copy_from_slice(&u16::to_le_bytes(total_secs));
    buf[21] = 0xf8;
    buf[22..24].copy_from_slice(&u16::to_le_bytes(fat_secs));
    buf[43..54].copy_from_slice(b"NO NAME    ");
    buf[54..62].copy_from_slice(b"FAT16   ");
    buf[510] = 0x55;
    buf[511] = 0xaa;
    buf
}

/// 32-byte short directory entry
pub fn short_dir_entry(name: &[u8;11],attr: u8,cluster: u32,size: u32) -> [u8;32] {
    let mut e: [u8;32] = [0;32];
    e[0..11].copy_from_slice(name);
    e[11] = attr;
    e[20..22].copy_from_slice(&u16::to_le_bytes((cluster >> 16) as u16));
    e[26..28].copy_from_slice(&u16::to_le_bytes((cluster & 0xffff) as u16));
    e[28..32].copy_from_slice(&u32::to_le_bytes(size));
    e
}

/// NTFS boot sector: 512 b/s, `spc` sectors per cluster, 1024-byte records,
/// one-cluster INDX buffers
pub fn ntfs_boot_sector(total_secs: u64,spc: u8,hidden: u32,mft_lcn: u64) -> Vec<u8> {
    let mut buf = vec![0u8;512];
    buf[0..3].copy_from_slice(&[0xeb,0x52,0x90]);
    buf[3..11].copy_from_slice(b"NTFS    ");
    buf[11..13].copy_from_slice(&u16::to_le_bytes(512));
    buf[13] = spc;
    buf[21] = 0xf8;
    buf[28..32].copy_from_slice(&u32::to_le_bytes(hidden));
    buf[40..48].copy_from_slice(&u64::to_le_bytes(total_secs));
    buf[48..56].copy_from_slice(&u64::to_le_bytes(mft_lcn));
    buf[56..64].copy_from_slice(&u64::to_le_bytes(2));
    buf[64] = 0xf6; // 1024-byte records
    buf[68] = 1;
    buf[510] = 0x55;
    buf[511] = 0xaa;
    buf
}

/// $30 FILE_NAME payload (also the index-entry key layout)
pub fn filename_payload(name: &str,parent: u64,directory: bool,logical: u64,physical: u64) -> Vec<u8> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let mut key = vec![0u8;66 + 2*units.len()];
    key[0..8].copy_from_slice(&u64::to_le_bytes(parent | (1u64 << 48)));
    key[40..48].copy_from_slice(&u64::to_le_bytes(physical));
    key[48..56].copy_from_slice(&u64::to_le_bytes(logical));
    if directory {
        key[56..60].copy_from_slice(&u32::to_le_bytes(0x1000_0000));
    }
    key[64] = units.len() as u8;
    key[65] = 1;
    for (i,u) in units.iter().enumerate() {
        key[66+2*i..68+2*i].copy_from_slice(&u16::to_le_bytes(*u));
    }
    key
}

/// $10 STANDARD_INFORMATION payload with the four FILETIMEs and flags
pub fn standard_info_payload(created: u64,modified: u64,changed: u64,accessed: u64,flags: u32) -> Vec<u8> {
    let mut buf = vec![0u8;48];
    buf[0..8].copy_from_slice(&u64::to_le_bytes(created));
    buf[8..16].copy_from_slice(&u64::to_le_bytes(modified));
    buf[16..24].copy_from_slice(&u64::to_le_bytes(changed));
    buf[24..32].copy_from_slice(&u64::to_le_bytes(accessed));
    buf[32..36].copy_from_slice(&u32::to_le_bytes(flags));
    buf
}

/// resident attribute with optional name
pub fn resident_attr(type_code: u32,name: &str,payload: &[u8],id: u16) -> Vec<u8> {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let name_len = name_units.len();
    let name_ofs = 24;
    let attr_ofs = 24 + 2*name_len;
    let attr_ofs = (attr_ofs + 7) & !7;
    let mut total = attr_ofs + payload.len();
    total = (total + 7) & !7;
    let mut a = vec![0u8;total];
    a[0..4].copy_from_slice(&u32::to_le_bytes(type_code));
    a[4..8].copy_from_slice(&u32::to_le_bytes(total as u32));
    a[8] = 0; // resident
    a[9] = name_len as u8;
    a[10..12].copy_from_slice(&u16::to_le_bytes(name_ofs as u16));
    a[14..16].copy_from_slice(&u16::to_le_bytes(id));
    a[16..20].copy_from_slice(&u32::to_le_bytes(payload.len() as u32));
    a[20..22].copy_from_slice(&u16::to_le_bytes(attr_ofs as u16));
    for (i,u) in name_units.iter().enumerate() {
        a[name_ofs+2*i..name_ofs+2*i+2].copy_from_slice(&u16::to_le_bytes(*u));
    }
    a[attr_ofs..attr_ofs+payload.len()].copy_from_slice(payload);
    a
}

/// non-resident attribute with optional name and a raw data-run stream
pub fn nonres_attr(type_code: u32,name: &str,first_vcn: u64,last_vcn: u64,runs: &[u8],id: u16) -> Vec<u8> {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let name_len = name_units.len();
    let name_ofs = 64;
    let run_ofs = 64 + 2*name_len;
    let run_ofs = (run_ofs + 7) & !7;
    let mut total = run_ofs + runs.len();
    total = (total + 7) & !7;
    let mut a = vec![0u8;total];
    a[0..4].copy_from_slice(&u32::to_le_bytes(type_code));
    a[4..8].copy_from_slice(&u32::to_le_bytes(total as u32));
    a[8] = 1; // non-resident
    a[9] = name_len as u8;
    a[10..12].copy_from_slice(&u16::to_le_bytes(name_ofs as u16));
    a[14..16].copy_from_slice(&u16::to_le_bytes(id));
    a[16..24].copy_from_slice(&u64::to_le_bytes(first_vcn));
    a[24..32].copy_from_slice(&u64::to_le_bytes(last_vcn));
    a[32..34].copy_from_slice(&u16::to_le_bytes(run_ofs as u16));
    let clusters = last_vcn - first_vcn + 1;
    a[40..48].copy_from_slice(&u64::to_le_bytes(clusters*4096));
    a[48..56].copy_from_slice(&u64::to_le_bytes(clusters*4096));
    a[56..64].copy_from_slice(&u64::to_le_bytes(clusters*4096));
    for (i,u) in name_units.iter().enumerate() {
        a[name_ofs+2*i..name_ofs+2*i+2].copy_from_slice(&u16::to_le_bytes(*u));
    }
    a[run_ofs..run_ofs+runs.len()].copy_from_slice(runs);
    a
}

/// one item of a $20 ATTRIBUTE_LIST payload
pub fn attr_list_item(type_code: u32,start_vcn: u64,mft: u64,attr_id: u16) -> Vec<u8> {
    let mut item = vec![0u8;32];
    item[0..4].copy_from_slice(&u32::to_le_bytes(type_code));
    item[4..6].copy_from_slice(&u16::to_le_bytes(32));
    item[8..16].copy_from_slice(&u64::to_le_bytes(start_vcn));
    item[16..24].copy_from_slice(&u64::to_le_bytes(mft | (1u64 << 48)));
    item[24..26].copy_from_slice(&u16::to_le_bytes(attr_id));
    item
}

/// assemble a fixed-up 1024-byte MFT record around the attribute stream
pub fn mft_record(record_number: u32,flags: u16,attrs: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = vec![0u8;1024];
    buf[0..4].copy_from_slice(b"FILE");
    buf[4..6].copy_from_slice(&u16::to_le_bytes(48));
    buf[6..8].copy_from_slice(&u16::to_le_bytes(3));
    buf[16..18].copy_from_slice(&u16::to_le_bytes(1));
    buf[18..20].copy_from_slice(&u16::to_le_bytes(1));
    buf[20..22].copy_from_slice(&u16::to_le_bytes(56));
    buf[22..24].copy_from_slice(&u16::to_le_bytes(flags));
    buf[28..32].copy_from_slice(&u32::to_le_bytes(1024));
    buf[44..48].copy_from_slice(&u32::to_le_bytes(record_number));
    let mut pos = 56;
    for a in attrs {
        buf[pos..pos+a.len()].copy_from_slice(a);
        pos += a.len();
    }
    buf[pos..pos+4].copy_from_slice(&u32::to_le_bytes(0xffffffff));
    pos += 8;
    buf[24..28].copy_from_slice(&u32::to_le_bytes(pos as u32));
    // fixup: displace the true tails into the update sequence array
    buf[48..50].copy_from_slice(&[0xad,0xba]);
    for i in 1..3 {
        let tail = 512*i - 2;
        buf[48+2*i] = buf[tail];
        buf[48+2*i+1] = buf[tail+1];
        buf[tail] = 0xad;
        buf[tail+1] = 0xba;
    }
    buf
}
