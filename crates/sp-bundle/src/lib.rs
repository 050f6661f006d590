//! Script bundle codec and loader emitter for scriptpack.
//!
//! This crate reads and writes the engine's native script store: a Marshal
//! object graph holding an array of `[section_id, name, deflated_code]`
//! triples. Only that restricted graph shape is supported; anything else is
//! rejected as corrupt.
//!
//! # Bundle Format
//!
//! - Marshal version header `\x04\x08`
//! - Top-level array of 3-element arrays
//! - `section_id`: Fixnum, random per encode pass
//! - `name`: UTF-8 string with the engine's encoding ivar tagging
//! - `code`: binary string holding a zlib stream of the source text
//!
//! One reserved section id ([`LOADER_SECTION_ID`]) marks the loader entry
//! emitted by [`loader`]; it is excluded from extraction and re-appended
//! fresh on every encode.
//!
//! # Example
//!
//! ```no_run
//! use sp_bundle::{decode, encode, BundleEntry};
//!
//! let bytes = std::fs::read("Scripts.rvdata2").unwrap();
//! let entries = decode(&bytes).unwrap();
//! let rewritten = encode(&entries).unwrap();
//! std::fs::write("Scripts.rvdata2", rewritten).unwrap();
//! ```

pub mod codec;
pub mod error;
pub mod loader;
pub mod marshal;

pub use codec::{
    assign_section_ids, decode, encode, generate_section_id, is_extraction_needed, BundleEntry,
    LOADER_SECTION_ID, SECTION_ID_CEILING,
};
pub use error::{BundleError, Result};
pub use loader::{loader_entry, loader_program, LoaderParams, LOADER_SECTION_NAME};
