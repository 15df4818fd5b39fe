//! ### FAT Packing Module
//!
//! Functions to unpack dates, times, and 8.3 filenames from directory entries.
//! Analysis never packs anything back.

use chrono::{NaiveDate,NaiveTime};

pub const DOT: ([u8;8],[u8;3]) = ([b'.',32,32,32,32,32,32,32],[32,32,32]);
pub const DOTDOT: ([u8;8],[u8;3]) = ([b'.',b'.',32,32,32,32,32,32],[32,32,32]);

/// DOS date: year = 1980 + top 7 bits, month = middle 4 bits, day = low 5 bits.
/// Returns None for the zero stamp or an impossible calendar date.
pub fn unpack_date(fat_date: [u8;2]) -> Option<NaiveDate> {
    if fat_date==[0,0] {
        return None;
    }
    let date16 = u16::from_le_bytes(fat_date);
    let year = 1980 + (date16 >> 9) as i32;
    let month = ((date16 & 0b0000_0001_1110_0000) >> 5) as u32;
    let day = (date16 & 0b1_1111) as u32;
    NaiveDate::from_ymd_opt(year,month,day)
}

/// DOS time: hour = top 5 bits, minute = middle 6 bits, second = low 5 bits doubled.
/// Returns None when any field is out of range.
pub fn unpack_time(fat_time: [u8;2],tenths: u8) -> Option<NaiveTime> {
    let time16 = u16::from_le_bytes(fat_time);
    let hour = (time16 >> 11) as u32;
    let min = ((time16 & 0b0000_0111_1110_0000) >> 5) as u32;
    let sec2 = (time16 & 0b1_1111) as u32;
    NaiveTime::from_hms_opt(hour,min,sec2*2 + tenths as u32/10)
}

/// Convert 8+3 name bytes to a display string.  Dot and DotDot are specially
/// handled.  A deleted entry's first byte is the 0xE5 marker, rendered as `_`.
/// NULs terminate, trailing spaces are trimmed, non-ascii bytes are escaped.
pub fn short_name_to_string(name: [u8;8],ext: [u8;3],deleted: bool) -> String {
    if (name,ext)==DOT {
        return ".".to_string();
    }
    if (name,ext)==DOTDOT {
        return "..".to_string();
    }
    let mut base_bytes = name.to_vec();
    if deleted {
        base_bytes[0] = b'_';
    }
    let base = ascii_field(&base_bytes);
    let typ = ascii_field(&ext);
    match typ.len() {
        0 => base,
        _ => [base,".".to_string(),typ].concat()
    }
}

/// drop at the first NUL, escape non-ascii, trim trailing spaces
fn ascii_field(bytes: &[u8]) -> String {
    let mut ans = String::new();
    for b in bytes {
        match *b {
            0 => break,
            x if x >= 0x20 && x < 0x7f => ans.push(x as char),
            x => ans += &format!("\\x{:02X}",x)
        }
    }
    ans.trim_end().to_string()
}

/// attribute flags as the usual RHSVDA string, dots for clear bits
pub fn attr_string(attr: u8) -> String {
    let flags = [
        (super::directory::READ_ONLY,'R'),
        (super::directory::HIDDEN,'H'),
        (super::directory::SYSTEM,'S'),
        (super::directory::VOLUME_ID,'V'),
        (super::directory::DIRECTORY,'D'),
        (super::directory::ARCHIVE,'A')
    ];
    let mut ans = String::new();
    for (mask,c) in flags {
        match attr & mask {
            0 => ans.push('.'),
            _ => ans.push(c)
        }
    }
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_time() {
        // 13:33:30 -> hour 13, minute 33, seconds 15*2
        let val: u16 = (13 << 11) | (33 << 5) | 15;
        let t = unpack_time(u16::to_le_bytes(val),0).expect("bad time");
        assert_eq!(t,NaiveTime::from_hms_opt(13,33,30).unwrap());
    }

    #[test]
    fn dos_time_domain() {
        // decoding is defined on the whole 16-bit domain, out of range fields map to None
        for val in 0..=u16::MAX {
            if let Some(t) = unpack_time(u16::to_le_bytes(val),0) {
                use chrono::Timelike;
                assert!(t.hour() < 24);
                assert!(t.minute() < 60);
                assert!(t.second() <= 58 && t.second() % 2 == 0);
            } else {
                let hour = val >> 11;
                let min = (val >> 5) & 0x3f;
                let sec = (val & 0x1f)*2;
                assert!(hour > 23 || min > 59 || sec > 58);
            }
        }
    }

    #[test]
    fn dos_date() {
        // 2015-07-15
        let val: u16 = ((2015-1980) << 9) | (7 << 5) | 15;
        let d = unpack_date(u16::to_le_bytes(val)).expect("bad date");
        assert_eq!(d,NaiveDate::from_ymd_opt(2015,7,15).unwrap());
        assert_eq!(unpack_date([0,0]),None);
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name_to_string(*b"README  ",*b"TXT",false),"README.TXT");
        assert_eq!(short_name_to_string(*b"NOEXT   ",*b"   ",false),"NOEXT");
        assert_eq!(short_name_to_string(*b"\xe5ELETED ",*b"JPG",true),"_ELETED.JPG");
        assert_eq!(short_name_to_string(DOT.0,DOT.1,false),".");
        assert_eq!(short_name_to_string(DOTDOT.0,DOTDOT.1,false),"..");
    }
}
