//! Output inspection helpers

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Decompress an NDJSON export and parse every line
pub fn read_ndjson(path: &Path) -> Vec<Value> {
    let compressed = std::fs::read(path).expect("output file readable");
    let plain = zstd::stream::decode_all(compressed.as_slice()).expect("single valid zstd stream");
    String::from_utf8(plain)
        .expect("output is UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON object"))
        .collect()
}

/// Decompress a length-framed export and parse every frame
pub fn read_framed(path: &Path) -> Vec<Value> {
    let compressed = std::fs::read(path).expect("output file readable");
    let plain = zstd::stream::decode_all(compressed.as_slice()).expect("single valid zstd stream");
    let mut records = Vec::new();
    let mut rest = plain.as_slice();
    while !rest.is_empty() {
        let (len, tail) = rest.split_at(4);
        let len = u32::from_be_bytes(len.try_into().expect("4-byte length")) as usize;
        let (json, tail) = tail.split_at(len);
        records.push(serde_json::from_slice(json).expect("frame holds one JSON object"));
        rest = tail;
    }
    records
}

/// Ids of `records`, asserting none appears twice
pub fn assert_unique_ids(records: &[Value]) -> HashSet<String> {
    let mut ids = HashSet::new();
    for record in records {
        let id = record["id"].as_str().expect("string id").to_string();
        assert!(ids.insert(id.clone()), "duplicate id {id} in output");
    }
    ids
}
