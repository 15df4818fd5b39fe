// tests of partition discovery and mount plans
mod common;

use std::str::FromStr;
use common::{mbr_entry,mbr_sector,SparseImage};
use dfkit::bios::bytes::Guid;
use dfkit::img::MemImage;
use dfkit::part::{self,Scheme};

#[test]
fn single_fat32_partition() {
    // 64 MiB image with one FAT32 partition starting at LBA 2048
    let total_secs: u32 = 131072;
    let mut img_buf = vec![0u8;512*4];
    img_buf[0..512].copy_from_slice(&mbr_sector(&[mbr_entry(0x80,0x0c,2048,total_secs)]));
    let mut img = MemImage::new(img_buf);
    let (scheme,parts) = part::scan_partitions(&mut img).expect("scan failed");
    assert_eq!(scheme,Scheme::Mbr);
    assert_eq!(parts.len(),1);
    assert_eq!(parts[0].index,1);
    assert_eq!(parts[0].type_code,Some(0x0c));
    assert_eq!(parts[0].first_lba,2048);
    assert_eq!(parts[0].sector_count,total_secs as u64);
    let plan = parts[0].mount_plan("disk.img").expect("should be mountable");
    assert_eq!(plan.mountpoint,"/media/part1");
    assert_eq!(plan.offset_bytes,2048*512);
    assert_eq!(plan.size_limit,Some(total_secs as u64 * 512));
    assert_eq!(plan.options(),format!("loop,ro,noatime,offset={},sizelimit={}",2048*512,total_secs as u64*512));
}

#[test]
fn extended_chain_two_logicals() {
    // extended container at LBA 2048 holding two logical FAT16 volumes
    let mut img = SparseImage::new(512*50000);
    img.write(0,&mbr_sector(&[
        mbr_entry(0x80,0x06,63,1985),
        mbr_entry(0x00,0x05,2048,40960)
    ]));
    // first EBR: logical at +63, link to next EBR at container-relative 20544
    img.write(512*2048,&mbr_sector(&[
        mbr_entry(0x00,0x06,63,20481),
        mbr_entry(0x00,0x05,20544,20416)
    ]));
    // second EBR: logical at +63, end of chain
    img.write(512*(2048+20544),&mbr_sector(&[
        mbr_entry(0x00,0x06,63,20353)
    ]));
    let (scheme,parts) = part::scan_partitions(&mut img).expect("scan failed");
    assert_eq!(scheme,Scheme::Mbr);
    // primary, container, and two logicals
    assert_eq!(parts.len(),4);
    assert_eq!(parts[0].index,1);
    assert!(parts[1].is_extended_container());
    assert_eq!(parts[2].index,5);
    assert_eq!(parts[2].first_lba,2048+63);
    assert_eq!(parts[3].index,6);
    assert_eq!(parts[3].first_lba,2048+20544+63);
    // logical partitions mount without a size limit
    let plan = parts[2].mount_plan("disk.img").expect("should be mountable");
    assert_eq!(plan.mountpoint,"/media/part5");
    assert_eq!(plan.options(),format!("loop,ro,noatime,offset={}",(2048u64+63)*512));
    // the container itself is not mountable
    assert!(parts[1].mount_plan("disk.img").is_none());
}

#[test]
fn swap_is_not_mountable() {
    let mut img_buf = vec![0u8;1024];
    img_buf[0..512].copy_from_slice(&mbr_sector(&[mbr_entry(0,0x82,2048,8192)]));
    let mut img = MemImage::new(img_buf);
    let (_,parts) = part::scan_partitions(&mut img).expect("scan failed");
    assert!(parts[0].is_swap());
    assert!(parts[0].mount_plan("disk.img").is_none());
}

#[test]
fn bad_signature_is_an_error() {
    let mut img = MemImage::new(vec![0u8;512]);
    assert!(part::scan_partitions(&mut img).is_err());
}

#[test]
fn gpt_scan() {
    let mut img = SparseImage::new(512*100);
    // protective MBR
    img.write(0,&mbr_sector(&[mbr_entry(0,0xee,1,99)]));
    // header at LBA 1
    let mut header = vec![0u8;512];
    header[0..8].copy_from_slice(b"EFI PART");
    header[24..32].copy_from_slice(&u64::to_le_bytes(1));  // current LBA
    header[32..40].copy_from_slice(&u64::to_le_bytes(99)); // backup LBA
    header[40..48].copy_from_slice(&u64::to_le_bytes(34));
    header[48..56].copy_from_slice(&u64::to_le_bytes(90));
    header[72..80].copy_from_slice(&u64::to_le_bytes(2));  // table LBA
    header[80..84].copy_from_slice(&u32::to_le_bytes(128));
    header[84..88].copy_from_slice(&u32::to_le_bytes(128));
    img.write(512,&header);
    // entry 0: basic data named "data", entry 1: unknown type
    let basic = Guid::from_str("EBD0A0A2-B9E5-4433-87C0-68B6B72699C7").expect("parse failed");
    let unknown = Guid::from_str("12345678-9ABC-DEF0-1234-56789ABCDEF0").expect("parse failed");
    let mut e0 = vec![0u8;128];
    e0[0..16].copy_from_slice(&basic.to_bytes());
    e0[16..32].copy_from_slice(&basic.to_bytes());
    e0[32..40].copy_from_slice(&u64::to_le_bytes(2048));
    e0[40..48].copy_from_slice(&u64::to_le_bytes(4095));
    for (i,c) in "data".encode_utf16().enumerate() {
        e0[56+2*i..58+2*i].copy_from_slice(&u16::to_le_bytes(c));
    }
    img.write(512*2,&e0);
    let mut e1 = vec![0u8;128];
    e1[0..16].copy_from_slice(&unknown.to_bytes());
    e1[32..40].copy_from_slice(&u64::to_le_bytes(8192));
    e1[40..48].copy_from_slice(&u64::to_le_bytes(9215));
    img.write(512*2 + 128,&e1);

    let (scheme,parts) = part::scan_partitions(&mut img).expect("scan failed");
    assert_eq!(scheme,Scheme::Gpt);
    assert_eq!(parts.len(),2);
    assert_eq!(parts[0].index,0);
    assert_eq!(parts[0].label.as_deref(),Some("data"));
    assert_eq!(parts[0].first_lba,2048);
    assert_eq!(parts[0].sector_count,2048);
    assert!(parts[0].is_mountable());
    assert!(!parts[1].is_mountable());
    let plan = parts[0].mount_plan("gpt.img").expect("should be mountable");
    assert_eq!(plan.mountpoint,"/media/part0");
    assert_eq!(plan.size_limit,Some(2048*512));
}

#[test]
fn missing_gpt_header_is_an_error() {
    let mut img = SparseImage::new(512*100);
    img.write(0,&mbr_sector(&[mbr_entry(0,0xee,1,99)]));
    assert!(part::scan_partitions(&mut img).is_err());
}
