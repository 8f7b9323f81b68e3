//! Decoder for the packed event records returned by `read(2)` on an inotify descriptor.
//!
//! Every record is a fixed header followed by a NUL-padded name of the declared length:
//!
//! ```text
//! | wd: i32 | mask: u32 | cookie: u32 | len: u32 | name: [u8; len] |
//! ```
//!
//! Records are packed back to back. All fields are in native byte order.

use super::sys::WatchDescriptor;
use crate::{Error, Result};
use notify_stream_types::event::Op;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

/// Size of the fixed part of a record.
pub(crate) const HEADER_LEN: usize = 16;

/// Longest file name the kernel reports, not counting the terminating NUL.
pub(crate) const NAME_MAX: usize = 255;

/// A record borrowed from the read buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RawRecord<'a> {
    pub wd: WatchDescriptor,
    pub mask: Op,
    #[allow(dead_code)]
    pub cookie: u32,
    pub name: Option<&'a OsStr>,
}

/// Cursor over the records in a buffer.
///
/// Yields an error and stops as soon as a record would extend past the end of the buffer.
pub(crate) struct Records<'a> {
    buffer: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Records<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            offset: 0,
            failed: false,
        }
    }

    fn decode_next(&mut self) -> Result<RawRecord<'a>> {
        let rest = &self.buffer[self.offset..];
        if rest.len() < HEADER_LEN {
            return Err(Error::decode(format!(
                "truncated header at offset {}: {} of {HEADER_LEN} bytes",
                self.offset,
                rest.len()
            )));
        }

        let wd = field(rest, 0) as i32;
        let mask = Op::from_bits_retain(field(rest, 4));
        let cookie = field(rest, 8);
        let len = field(rest, 12) as usize;

        let name_bytes = rest
            .get(HEADER_LEN..)
            .and_then(|tail| tail.get(..len))
            .ok_or_else(|| {
                Error::decode(format!(
                    "name of {len} bytes at offset {} overruns the buffer",
                    self.offset
                ))
            })?;

        // the name is padded with NULs up to an alignment boundary
        let name = name_bytes
            .split(|b| *b == 0)
            .next()
            .filter(|name| !name.is_empty())
            .map(OsStr::from_bytes);

        self.offset += HEADER_LEN + len;

        Ok(RawRecord {
            wd: WatchDescriptor(wd),
            mask,
            cookie,
            name,
        })
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buffer.len() {
            return None;
        }
        let record = self.decode_next();
        self.failed = record.is_err();
        Some(record)
    }
}

/// Reads the `u32` at `at`; the caller has checked that the whole header is present.
fn field(header: &[u8], at: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&header[at..at + 4]);
    u32::from_ne_bytes(bytes)
}

/// Encodes a record the way the kernel lays it out, padding the name to 16 bytes.
#[cfg(test)]
pub(crate) fn encode(wd: i32, mask: Op, cookie: u32, name: Option<&str>) -> Vec<u8> {
    let name = name.map(str::as_bytes).unwrap_or_default();
    let len = if name.is_empty() {
        0
    } else {
        (name.len() + 1).div_ceil(HEADER_LEN) * HEADER_LEN
    };
    let mut record = Vec::with_capacity(HEADER_LEN + len);
    record.extend_from_slice(&wd.to_ne_bytes());
    record.extend_from_slice(&mask.bits().to_ne_bytes());
    record.extend_from_slice(&cookie.to_ne_bytes());
    record.extend_from_slice(&(len as u32).to_ne_bytes());
    record.extend_from_slice(name);
    record.resize(HEADER_LEN + len, 0);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;

    fn decode_all(buffer: &[u8]) -> Result<Vec<RawRecord<'_>>> {
        Records::new(buffer).collect()
    }

    #[test]
    fn decodes_records_in_order() {
        let mut buffer = encode(1, Op::CREATE, 0, Some("a.txt"));
        buffer.extend(encode(2, Op::MODIFY, 0, None));
        buffer.extend(encode(1, Op::MOVED_FROM, 42, Some("a-much-longer-name-than-sixteen")));

        let records = decode_all(&buffer).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].wd, WatchDescriptor(1));
        assert_eq!(records[0].mask, Op::CREATE);
        assert_eq!(records[0].name, Some(OsStr::new("a.txt")));

        assert_eq!(records[1].wd, WatchDescriptor(2));
        assert_eq!(records[1].name, None);

        assert_eq!(records[2].cookie, 42);
        assert_eq!(
            records[2].name,
            Some(OsStr::new("a-much-longer-name-than-sixteen"))
        );
    }

    #[test]
    fn name_padding_is_stripped() {
        let buffer = encode(3, Op::DELETE, 0, Some("x"));
        assert_eq!(buffer.len(), HEADER_LEN + 16);
        let records = decode_all(&buffer).unwrap();
        assert_eq!(records[0].name, Some(OsStr::new("x")));
    }

    #[test]
    fn empty_buffer_has_no_records() {
        assert!(decode_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut buffer = encode(1, Op::CREATE, 0, None);
        buffer.extend_from_slice(&[0; HEADER_LEN - 1]);

        let mut records = Records::new(&buffer);
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Decode(_)), "{err:?}");
        assert!(records.next().is_none());
    }

    #[test]
    fn name_overrunning_the_buffer_is_rejected() {
        let mut buffer = encode(1, Op::CREATE, 0, Some("file"));
        buffer.truncate(HEADER_LEN + 4);

        let err = decode_all(&buffer).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Decode(_)), "{err:?}");
    }

    #[test]
    fn huge_declared_length_does_not_overflow() {
        let mut buffer = encode(1, Op::CREATE, 0, None);
        buffer[12..16].copy_from_slice(&u32::MAX.to_ne_bytes());

        let err = decode_all(&buffer).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Decode(_)), "{err:?}");
    }

    #[test]
    fn unknown_mask_bits_are_kept() {
        let buffer = encode(1, Op::from_bits_retain(0x1000) | Op::ISDIR, 0, None);
        let records = decode_all(&buffer).unwrap();
        assert_eq!(records[0].mask.bits(), 0x1000 | Op::ISDIR.bits());
    }
}
