//! Workspace orchestration: keeps the section tree, the scripts directory
//! and the load-order manifest moving in lockstep, and converts game
//! bundles to and from that on-disk form.
//!
//! The [`Editor`] facade is the intended entry point; the lower-level
//! modules (`projector`, `manifest`, `extract`, `pack`, `events`) are
//! exposed for callers that drive the pieces directly.

pub mod editor;
pub mod error;
pub mod events;
pub mod extract;
pub mod manifest;
pub mod pack;
pub mod projector;

pub use editor::{Editor, StatusReport};
pub use error::{Result, WorkspaceError};
pub use events::{apply_event, FsEvent};
pub use extract::{extract_bundle, loader_params, write_loader_bundle, ExtractOutcome};
pub use manifest::{read_manifest, write_manifest, ReadOutcome, SKIP_CHAR};
pub use pack::{pack_bundle, PackReport};
pub use projector::{
    create_section, delete_section, move_sections, paste_sections, rename_section, scan,
};
