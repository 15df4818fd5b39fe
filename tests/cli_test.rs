// test of the command line interface
mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use common::{mbr_entry,mbr_sector};

type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn write_mbr_image(dir: &std::path::Path) -> std::path::PathBuf {
    let mut img = vec![0u8;512*8];
    img[0..512].copy_from_slice(&mbr_sector(&[
        mbr_entry(0x80,0x0c,2048,131072),
        mbr_entry(0x00,0x82,133120,8192)
    ]));
    let path = dir.join("disk.img");
    std::fs::write(&path,img).expect("could not write image");
    path
}

#[test]
fn scan_lists_partitions() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let img = write_mbr_image(dir.path());
    let mut cmd = Command::cargo_bin("dfkit")?;
    cmd.arg("scan")
        .arg("-f").arg(&img)
        .assert()
        .success()
        .stdout(predicate::str::contains("MBR partition table"))
        .stdout(predicate::str::contains("first LBA 2048"))
        .stdout(predicate::str::contains("(swap)"));
    Ok(())
}

#[test]
fn scan_json_mode() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let img = write_mbr_image(dir.path());
    let mut cmd = Command::cargo_bin("dfkit")?;
    cmd.arg("scan")
        .arg("-f").arg(&img)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"scheme\": \"MBR\""))
        .stdout(predicate::str::contains("\"first_lba\": 2048"));
    Ok(())
}

#[test]
fn mount_plans() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let img = write_mbr_image(dir.path());
    let mut cmd = Command::cargo_bin("dfkit")?;
    cmd.arg("mount")
        .arg("-f").arg(&img)
        .assert()
        .success()
        .stdout(predicate::str::contains("loop,ro,noatime,offset=1048576,sizelimit=67108864"))
        .stdout(predicate::str::contains("/media/part1"));
    Ok(())
}

#[test]
fn timeline_from_mft_stream() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let mft_path = dir.path().join("mft.bin");
    let rec = common::mft_record(8,0x01,&[
        common::resident_attr(0x10,"",&common::standard_info_payload(0,0,0,0,0x20),0),
        common::resident_attr(0x30,"",&common::filename_payload("evidence.txt",5,false,321,1024),1)
    ]);
    std::fs::write(&mft_path,rec)?;
    let mut cmd = Command::cargo_bin("dfkit")?;
    cmd.arg("timeline")
        .arg("-m").arg(&mft_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Source;AccessDate;AccessTime"))
        .stdout(predicate::str::contains("\"evidence.txt\""))
        .stdout(predicate::str::contains("1970-01-01"));
    Ok(())
}

#[test]
fn missing_image_fails() -> STDRESULT {
    let mut cmd = Command::cargo_bin("dfkit")?;
    cmd.arg("scan")
        .arg("-f").arg("no-such-image.img")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn chunk_pipes_raw_bytes() -> STDRESULT {
    let dir = tempfile::tempdir()?;
    let img = write_mbr_image(dir.path());
    let mut cmd = Command::cargo_bin("dfkit")?;
    let output = cmd.arg("chunk")
        .arg("-f").arg(&img)
        .arg("-o").arg("0")
        .arg("-n").arg("1")
        .output()?;
    assert!(output.status.success());
    // piped output is the raw sector, signature included
    assert_eq!(output.stdout.len(),512);
    assert_eq!(&output.stdout[510..512],&[0x55,0xaa]);
    Ok(())
}
