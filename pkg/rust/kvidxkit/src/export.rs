// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 kvidxkit

//! The versioned binary export/import codec, plus its lossy JSON/CSV
//! export dialects.
//!
//! Binary v1 is little-endian regardless of host and regardless of the
//! adapter's native in-store framing (see [`kvidxkit_core::codec`]) — it
//! is the one format this crate will re-import, and the only lossless one.

use std::io::{Read, Write};

use kvidxkit_core::{Error, OwnedRecord, Result};

use crate::instance::Instance;

/// `"KVIDX\0\0\0"` read as a little-endian `u64`.
pub const MAGIC: u64 = 0x5844_4956_4556_4B00;
pub const BINARY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Binary,
    Json { pretty: bool, include_metadata: bool },
    Csv { include_metadata: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub start_key: u64,
    pub end_key: u64,
    pub format: ExportFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { start_key: 0, end_key: u64::MAX, format: ExportFormat::Binary }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOptions {
    pub clear_before_import: bool,
    pub skip_duplicates: bool,
}

/// Writes every record in `[options.start_key, options.end_key]` to
/// `writer` in the requested dialect. `progress(current, total)` is
/// invoked every 100 entries and once at completion; returning `false`
/// aborts the export with [`Error::Cancelled`]. The destination writer
/// keeps whatever partial bytes were already written — the caller owns
/// the partial file.
pub fn export(
    instance: &Instance,
    options: &ExportOptions,
    writer: &mut impl Write,
    mut progress: impl FnMut(u64, u64) -> bool,
) -> Result<()> {
    let entries = collect_entries(instance, options.start_key, options.end_key)?;
    let total = entries.len() as u64;
    match options.format {
        ExportFormat::Binary => write_binary(writer, &entries, total, &mut progress),
        ExportFormat::Json { pretty, include_metadata } => {
            write_json(writer, &entries, total, pretty, include_metadata, &mut progress)
        }
        ExportFormat::Csv { include_metadata } => write_csv(writer, &entries, total, include_metadata, &mut progress),
    }
}

/// Reads a binary v1 stream produced by [`export`] and inserts every
/// entry. Runs in a single transaction: any failure, including a
/// cancelled progress callback, aborts and leaves the store exactly as it
/// was before the call. Returns the number of entries actually written.
pub fn import(
    instance: &mut Instance,
    reader: &mut impl Read,
    options: &ImportOptions,
    mut progress: impl FnMut(u64, u64) -> bool,
) -> Result<u64> {
    let mut header = [0u8; 32];
    reader.read_exact(&mut header)?;
    let magic = u64::from_le_bytes(header[0..8].try_into().expect("8 bytes"));
    if magic != MAGIC {
        return Err(Error::Corrupt("not a kvidxkit binary export stream".into()));
    }
    let version = u32::from_le_bytes(header[8..12].try_into().expect("4 bytes"));
    if version != BINARY_VERSION {
        return Err(Error::NotSupported(format!("unsupported binary export version {version}")));
    }
    let entry_count = u64::from_le_bytes(header[16..24].try_into().expect("8 bytes"));

    instance.begin()?;
    let outcome = run_import(instance, reader, entry_count, options, &mut progress);
    match outcome {
        Ok(imported) => {
            instance.commit()?;
            Ok(imported)
        }
        Err(err) => {
            let _ = instance.abort();
            Err(err)
        }
    }
}

fn run_import(
    instance: &mut Instance,
    reader: &mut impl Read,
    entry_count: u64,
    options: &ImportOptions,
    progress: &mut impl FnMut(u64, u64) -> bool,
) -> Result<u64> {
    if options.clear_before_import {
        // keys >= 0 is every key a u64 can name.
        instance.remove_after_n_inclusive(0)?;
    }

    let mut imported = 0u64;
    for i in 0..entry_count {
        let mut fixed = [0u8; 32];
        reader.read_exact(&mut fixed)?;
        let key = u64::from_le_bytes(fixed[0..8].try_into().expect("8 bytes"));
        let term = u64::from_le_bytes(fixed[8..16].try_into().expect("8 bytes"));
        let cmd = u64::from_le_bytes(fixed[16..24].try_into().expect("8 bytes"));
        let payload_len = u64::from_le_bytes(fixed[24..32].try_into().expect("8 bytes")) as usize;
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        if instance.exists(key)? {
            if !options.skip_duplicates {
                instance.get_and_set(key, term, cmd, &payload)?;
                imported += 1;
            }
        } else {
            instance.insert(key, term, cmd, &payload)?;
            imported += 1;
        }
        report_at_boundary(i + 1, entry_count, progress)?;
    }
    if entry_count == 0 {
        report_at_boundary(0, 0, progress)?;
    }
    Ok(imported)
}

fn collect_entries(instance: &Instance, start_key: u64, end_key: u64) -> Result<Vec<OwnedRecord>> {
    if start_key > end_key {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    let mut cursor = if instance.exists(start_key)? { Some(start_key) } else { instance.get_next(start_key)? };
    while let Some(key) = cursor {
        if key > end_key {
            break;
        }
        if let Some(record) = instance.get(key)? {
            out.push(record.to_owned());
        }
        cursor = instance.get_next(key)?;
    }
    Ok(out)
}

fn report_at_boundary(current: u64, total: u64, progress: &mut impl FnMut(u64, u64) -> bool) -> Result<()> {
    if current % 100 == 0 || current == total {
        if !progress(current, total) {
            return Err(Error::Cancelled);
        }
    }
    Ok(())
}

fn write_binary(
    writer: &mut impl Write,
    entries: &[OwnedRecord],
    total: u64,
    progress: &mut impl FnMut(u64, u64) -> bool,
) -> Result<()> {
    writer.write_all(&MAGIC.to_le_bytes())?;
    writer.write_all(&BINARY_VERSION.to_le_bytes())?;
    writer.write_all(&0u32.to_le_bytes())?;
    writer.write_all(&total.to_le_bytes())?;
    for (index, entry) in entries.iter().enumerate() {
        writer.write_all(&entry.key.to_le_bytes())?;
        writer.write_all(&entry.term.to_le_bytes())?;
        writer.write_all(&entry.cmd.to_le_bytes())?;
        writer.write_all(&(entry.payload.len() as u64).to_le_bytes())?;
        writer.write_all(&entry.payload)?;
        report_at_boundary(index as u64 + 1, total, progress)?;
    }
    if entries.is_empty() {
        report_at_boundary(0, 0, progress)?;
    }
    Ok(())
}

fn write_json(
    writer: &mut impl Write,
    entries: &[OwnedRecord],
    total: u64,
    pretty: bool,
    include_metadata: bool,
    progress: &mut impl FnMut(u64, u64) -> bool,
) -> Result<()> {
    write!(writer, "{{\"format\":\"kvidx-json\",\"version\":1,\"entries\":[")?;
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            write!(writer, ",")?;
        }
        if pretty {
            write!(writer, "\n  ")?;
        }
        write!(writer, "{{\"key\":{}", entry.key)?;
        if include_metadata {
            write!(writer, ",\"term\":{},\"cmd\":{}", entry.term, entry.cmd)?;
        }
        write!(writer, ",\"data\":\"{}\"}}", json_escape(&entry.payload))?;
        report_at_boundary(index as u64 + 1, total, progress)?;
    }
    if pretty && !entries.is_empty() {
        write!(writer, "\n")?;
    }
    write!(writer, "]}}")?;
    if entries.is_empty() {
        report_at_boundary(0, 0, progress)?;
    }
    Ok(())
}

fn write_csv(
    writer: &mut impl Write,
    entries: &[OwnedRecord],
    total: u64,
    include_metadata: bool,
    progress: &mut impl FnMut(u64, u64) -> bool,
) -> Result<()> {
    if include_metadata {
        writeln!(writer, "key,term,cmd,data")?;
    } else {
        writeln!(writer, "key,data")?;
    }
    for (index, entry) in entries.iter().enumerate() {
        let data = csv_field(&String::from_utf8_lossy(&entry.payload));
        if include_metadata {
            writeln!(writer, "{},{},{},{}", entry.key, entry.term, entry.cmd, data)?;
        } else {
            writeln!(writer, "{},{}", entry.key, data)?;
        }
        report_at_boundary(index as u64 + 1, total, progress)?;
    }
    if entries.is_empty() {
        report_at_boundary(0, 0, progress)?;
    }
    Ok(())
}

/// Escapes a raw payload byte-for-byte: control characters
/// and `0x7F` become `\u00XX`, `"`/`\` are backslash-escaped, and
/// everything else — including non-UTF-8 bytes — passes through as its
/// Latin-1 code point so the output is always valid UTF-8 even though the
/// original bytes may not have been.
fn json_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x08 => out.push_str("\\b"),
            0x0C => out.push_str("\\f"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x00..=0x1F | 0x7F => out.push_str(&format!("\\u{byte:04x}")),
            _ => out.push(byte as char),
        }
    }
    out
}

/// RFC 4180 quoting: fields containing `,`, `"`, `\n`, or `\r` are
/// double-quoted with embedded `"` doubled.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_escape_handles_control_bytes_and_quotes() {
        assert_eq!(json_escape(b"a\"b"), "a\\\"b");
        assert_eq!(json_escape(b"\x01\x7f"), "\\u0001\\u007f");
        assert_eq!(json_escape(b"line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn csv_field_quotes_only_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("has \"quote\""), "\"has \"\"quote\"\"\"");
    }
}
