// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors
//
// Byte-level layout checks. The library-version header length is measured
// from an empty session rather than hard-coded, so the checks hold whatever
// the process table contains; nothing in this file mutates that table.

mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::CString;
use std::mem::size_of;
use std::rc::Rc;

use common::SharedSink;
use tessel_archive::{Archivable, Archive, Result};

fn save_binary(fill: impl FnOnce(&mut Archive) -> Result<()>) -> Vec<u8> {
    let sink = SharedSink::default();
    let mut ar = Archive::binary_writer(sink.clone()).expect("binary writer opens");
    fill(&mut ar).expect("write succeeds");
    drop(ar);
    sink.bytes()
}

fn save_text(fill: impl FnOnce(&mut Archive) -> Result<()>) -> Vec<u8> {
    let sink = SharedSink::default();
    let mut ar = Archive::text_writer(sink.clone()).expect("text writer opens");
    fill(&mut ar).expect("write succeeds");
    drop(ar);
    sink.bytes()
}

/// Bytes a write appends after the library-version header.
fn binary_payload(fill: impl FnOnce(&mut Archive) -> Result<()>) -> Vec<u8> {
    let header = save_binary(|_| Ok(()));
    let full = save_binary(fill);
    assert!(full.len() >= header.len());
    assert_eq!(&full[..header.len()], &header[..], "header must be payload independent");
    full[header.len()..].to_vec()
}

fn text_payload(fill: impl FnOnce(&mut Archive) -> Result<()>) -> Vec<u8> {
    let header = save_text(|_| Ok(()));
    let full = save_text(fill);
    full[header.len()..].to_vec()
}

#[test]
fn map_payload_is_length_prefix_then_pairs() {
    let payload = binary_payload(|ar| {
        let mut map = BTreeMap::from([("a".to_string(), 1i32), ("b".to_string(), 2i32)]);
        ar.xfer(&mut map)
    });

    let mut expected = Vec::new();
    expected.extend_from_slice(&2usize.to_le_bytes());
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.extend_from_slice(b"a");
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.extend_from_slice(&1i32.to_le_bytes());
    expected.extend_from_slice(b"b");
    expected.extend_from_slice(&2i32.to_le_bytes());
    assert_eq!(payload, expected);

    let full = save_binary(|ar| {
        let mut map = BTreeMap::from([("a".to_string(), 1i32), ("b".to_string(), 2i32)]);
        ar.xfer(&mut map)
    });
    let mut ar = Archive::binary_reader(std::io::Cursor::new(full.clone())).expect("binary reader opens");
    let mut map: BTreeMap<String, i32> = BTreeMap::new();
    ar.xfer(&mut map).expect("map reads");
    assert_eq!(map, BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
}

#[test]
fn thousand_doubles_binary_size() {
    let payload = binary_payload(|ar| {
        let mut values: Vec<f64> = (0..1000).map(f64::from).collect();
        ar.xfer(&mut values)
    });
    assert_eq!(payload.len(), size_of::<usize>() + 8 * 1000);
}

#[test]
fn thousand_doubles_text_token_count() {
    let payload = text_payload(|ar| {
        let mut values: Vec<f64> = (0..1000).map(f64::from).collect();
        ar.xfer(&mut values)
    });
    let text = String::from_utf8(payload).expect("text stream is UTF-8");
    assert_eq!(text.lines().count(), 1001, "length line plus one line per element");
    assert_eq!(text.split_whitespace().count(), 1001);
    assert_eq!(text.lines().next(), Some("1000"));
}

#[test]
fn c_string_binary_layout() {
    let payload = binary_payload(|ar| {
        ar.xfer(&mut Some(CString::new("hello").expect("no interior NUL")))?;
        ar.xfer(&mut None::<CString>)
    });

    let mut expected = Vec::new();
    expected.extend_from_slice(&5i64.to_le_bytes());
    expected.extend_from_slice(b"hello");
    expected.extend_from_slice(&(-1i64).to_le_bytes());
    assert_eq!(payload, expected);
}

#[test]
fn c_string_text_layout() {
    let payload = text_payload(|ar| {
        ar.xfer(&mut Some(CString::new("hello").expect("no interior NUL")))?;
        ar.xfer(&mut None::<CString>)
    });
    assert_eq!(payload, b"5\nhello\n-1\n");
}

#[derive(Default)]
struct Probe {
    tag: i32,
}

impl Archivable for Probe {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        self.tag.archive(ar)
    }

    fn fresh() -> Result<Self> {
        Ok(Self::default())
    }
}

#[test]
fn reference_sentinels_on_the_stream() {
    let shared = Rc::new(RefCell::new(Probe { tag: 5 }));
    let payload = binary_payload(|ar| {
        ar.xfer(&mut None::<Rc<RefCell<Probe>>>)?;
        ar.xfer(&mut Some(Rc::clone(&shared)))?;
        ar.xfer(&mut Some(Rc::clone(&shared)))
    });

    let mut expected = Vec::new();
    // null
    expected.extend_from_slice(&(-2i32).to_le_bytes());
    // first occurrence: new tag, erased flag, inner new tag, body
    expected.extend_from_slice(&(-1i32).to_le_bytes());
    expected.push(0);
    expected.extend_from_slice(&(-1i32).to_le_bytes());
    expected.extend_from_slice(&5i32.to_le_bytes());
    // back-reference: id 0, erased flag
    expected.extend_from_slice(&0i32.to_le_bytes());
    expected.push(0);
    assert_eq!(payload, expected);
}

#[test]
fn block_and_element_paths_agree_through_the_archive() {
    let values: Vec<f64> = (0..300).map(|i| f64::from(i) * 0.5).collect();
    // Vec<f64> takes the block path; transferring each element takes the
    // element path; the payload bytes must agree apart from the length prefix
    let block = binary_payload(|ar| ar.xfer(&mut values.clone()));
    let element = binary_payload(|ar| {
        for &v in &values {
            let mut single = v;
            ar.xfer(&mut single)?;
        }
        Ok(())
    });
    assert_eq!(&block[size_of::<usize>()..], &element[..]);
}
