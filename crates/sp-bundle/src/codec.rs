//! Bundle decode/encode over the restricted Marshal graph.
//!
//! A bundle is an array of `[section_id, name, deflated_code]` triples.
//! Decoding inflates every code payload so callers work with plain source
//! text; encoding deflates again at the maximum ratio.

use crate::error::{BundleError, Result};
use crate::marshal::{Reader, Value, Writer};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::Rng;
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::{debug, info};

/// Reserved section id for the loader entry. Never produced by
/// [`generate_section_id`].
pub const LOADER_SECTION_ID: u32 = 133_769_420;

/// Exclusive upper bound for generated section ids (31-bit Fixnum range).
pub const SECTION_ID_CEILING: u32 = i32::MAX as u32;

/// One named, compressed unit of content inside a bundle.
///
/// `code` holds the inflated source text; the zlib framing exists only on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub section_id: u32,
    pub name: String,
    pub code: String,
}

impl BundleEntry {
    pub fn new(section_id: u32, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            section_id,
            name: name.into(),
            code: code.into(),
        }
    }

    /// True for the synthetic loader entry.
    pub fn is_loader(&self) -> bool {
        self.section_id == LOADER_SECTION_ID
    }
}

/// Parse a bundle byte stream into its entries.
///
/// Fails with [`BundleError::Corrupt`] unless the top-level value is an
/// array of 3-element `[Int, String, String]` arrays. Names are decoded as
/// lossy UTF-8 so byte junk in a title never aborts the whole bundle.
pub fn decode(bytes: &[u8]) -> Result<Vec<BundleEntry>> {
    let mut reader = Reader::new(bytes)?;
    let top = reader.read_value()?;
    let rows = top
        .as_array()
        .ok_or_else(|| BundleError::corrupt("top-level value is not an array"))?;

    let mut entries = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let triple = row
            .as_array()
            .filter(|t| t.len() == 3)
            .ok_or_else(|| BundleError::corrupt(format!("entry {index} is not a 3-tuple")))?;

        let id = triple[0]
            .as_int()
            .ok_or_else(|| BundleError::corrupt(format!("entry {index}: id is not an integer")))?;
        let id = u32::try_from(id)
            .map_err(|_| BundleError::corrupt(format!("entry {index}: id {id} out of range")))?;

        let name_bytes = triple[1]
            .as_bytes()
            .ok_or_else(|| BundleError::corrupt(format!("entry {index}: name is not a string")))?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        let code_bytes = triple[2]
            .as_bytes()
            .ok_or_else(|| BundleError::corrupt(format!("entry {index}: code is not a string")))?;
        let code = inflate(code_bytes).map_err(|e| BundleError::BadPayload {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        entries.push(BundleEntry {
            section_id: id,
            name,
            code,
        });
    }

    debug!(entries = entries.len(), "Bundle decoded");
    Ok(entries)
}

/// Serialize entries back into the engine's wire format.
///
/// Names are written with the encoding ivar tagging the engine's loader
/// expects; code payloads are deflated at the best ratio with an explicit
/// finish flush. Encoding an empty slice yields a valid empty bundle.
pub fn encode(entries: &[BundleEntry]) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    writer.write_array_header(entries.len());

    for entry in entries {
        let payload = deflate(entry.code.as_bytes())?;
        // Marshal packed longs top out at four bytes; a payload whose
        // length exceeds them cannot be written without garbling the stream.
        if payload.len() > i32::MAX as usize {
            return Err(BundleError::BadPayload {
                name: entry.name.clone(),
                reason: format!("deflated payload of {} bytes exceeds the wire format", payload.len()),
            });
        }
        writer.write_array_header(3);
        writer.write_int(i64::from(entry.section_id));
        writer.write_utf8_string(&entry.name);
        writer.write_binary_string(&payload);
    }

    let bytes = writer.finish();
    info!(entries = entries.len(), bytes = bytes.len(), "Bundle encoded");
    Ok(bytes)
}

/// True iff at least one entry still carries real script content, i.e. its
/// id is not the reserved loader id.
pub fn is_extraction_needed(entries: &[BundleEntry]) -> bool {
    entries.iter().any(|e| !e.is_loader())
}

/// Generate a fresh section id not present in `used`.
///
/// Callers seed `used` with [`LOADER_SECTION_ID`] plus every id already
/// allocated in the current encode pass. Uniqueness is local to one bundle;
/// there is no cryptographic requirement.
pub fn generate_section_id(used: &HashSet<u32>) -> u32 {
    let mut rng = rand::rng();
    loop {
        let id = rng.random_range(0..SECTION_ID_CEILING);
        if id != LOADER_SECTION_ID && !used.contains(&id) {
            return id;
        }
    }
}

/// Re-id entries for encoding.
///
/// The first entry carrying [`LOADER_SECTION_ID`] is taken as the loader
/// and kept; every other entry gets a fresh id, so content entries that
/// arrive requesting the reserved id (or colliding with each other) end up
/// distinct. Run once per encode pass.
pub fn assign_section_ids(entries: &mut [BundleEntry]) {
    let mut used: HashSet<u32> = HashSet::from([LOADER_SECTION_ID]);
    let mut seen_loader = false;
    for entry in entries.iter_mut() {
        if entry.is_loader() && !seen_loader {
            seen_loader = true;
            continue;
        }
        let id = generate_section_id(&used);
        used.insert(id);
        entry.section_id = id;
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn inflate(data: &[u8]) -> std::io::Result<String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    // Permissive text decode: invalid bytes never abort extraction.
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let entries = vec![
            BundleEntry::new(1, "main", "puts 1"),
            BundleEntry::new(2, "Scene_Map", "class Scene_Map\nend\n"),
            BundleEntry::new(3, "", ""),
        ];

        let bytes = encode(&entries).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_empty_bundle_roundtrip() {
        let bytes = encode(&[]).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_array_top() {
        // Marshal.dump(42)
        let bytes = vec![4, 8, b'i', 47];
        assert!(matches!(decode(&bytes), Err(BundleError::Corrupt(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_tuple_arity() {
        let mut w = Writer::new();
        w.write_array_header(1);
        w.write_array_header(2);
        w.write_int(1);
        w.write_utf8_string("main");
        let bytes = w.finish();
        assert!(matches!(decode(&bytes), Err(BundleError::Corrupt(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_element_types() {
        let mut w = Writer::new();
        w.write_array_header(1);
        w.write_array_header(3);
        w.write_utf8_string("not an id");
        w.write_utf8_string("main");
        w.write_binary_string(b"");
        let bytes = w.finish();
        assert!(matches!(decode(&bytes), Err(BundleError::Corrupt(_))));
    }

    #[test]
    fn test_decode_rejects_undeflatable_code() {
        let mut w = Writer::new();
        w.write_array_header(1);
        w.write_array_header(3);
        w.write_int(1);
        w.write_utf8_string("main");
        w.write_binary_string(b"not a zlib stream");
        let bytes = w.finish();
        assert!(matches!(decode(&bytes), Err(BundleError::BadPayload { .. })));
    }

    #[test]
    fn test_decode_name_permissive() {
        let mut w = Writer::new();
        w.write_array_header(1);
        w.write_array_header(3);
        w.write_int(1);
        // Invalid UTF-8 in the title.
        w.write_binary_string(&[0xFF, 0xFE, b'x']);
        w.write_binary_string(&deflate(b"puts 1").unwrap());
        let bytes = w.finish();

        let entries = decode(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.ends_with('x'));
        assert_eq!(entries[0].code, "puts 1");
    }

    #[test]
    fn test_is_extraction_needed() {
        assert!(!is_extraction_needed(&[]));
        assert!(!is_extraction_needed(&[BundleEntry::new(
            LOADER_SECTION_ID,
            "loader",
            ""
        )]));
        assert!(is_extraction_needed(&[
            BundleEntry::new(LOADER_SECTION_ID, "loader", ""),
            BundleEntry::new(7, "main", "puts 1"),
        ]));
    }

    #[test]
    fn test_generate_section_id_avoids_used_and_reserved() {
        let mut used: HashSet<u32> = HashSet::new();
        used.insert(LOADER_SECTION_ID);
        for _ in 0..256 {
            let id = generate_section_id(&used);
            assert!(id < SECTION_ID_CEILING);
            assert!(!used.contains(&id));
            used.insert(id);
        }
    }

    #[test]
    fn test_assign_section_ids_keeps_one_loader() {
        // Two content entries both requesting the reserved id: the loader
        // stays unique and the impostors get fresh distinct ids.
        let mut entries = vec![
            BundleEntry::new(LOADER_SECTION_ID, "loader", ""),
            BundleEntry::new(LOADER_SECTION_ID, "impostor a", "puts 'a'"),
            BundleEntry::new(LOADER_SECTION_ID, "impostor b", "puts 'b'"),
        ];
        assign_section_ids(&mut entries);

        let loaders = entries.iter().filter(|e| e.is_loader()).count();
        assert_eq!(loaders, 1);
        assert_eq!(entries[0].section_id, LOADER_SECTION_ID);
        assert_ne!(entries[1].section_id, entries[2].section_id);
    }

    #[test]
    fn test_deflate_is_zlib() {
        let deflated = deflate(b"puts 1").unwrap();
        // zlib header with best compression: 0x78 0xDA
        assert_eq!(deflated[0], 0x78);
        assert_eq!(inflate(&deflated).unwrap(), "puts 1");
    }
}
