//! Script loader emission.
//!
//! The loader is the one synthetic bundle entry that survives extraction: a
//! small Ruby program the engine runs at start, which reads the load-order
//! manifest and loads each referenced file in order. On an unrecoverable
//! top-level failure it dumps a crash artifact (`type`, `mesg`, `back`) for
//! the external crash viewer before re-raising.

use crate::codec::{BundleEntry, LOADER_SECTION_ID};
use tracing::debug;

/// Display name of the loader entry inside a bundle.
pub const LOADER_SECTION_NAME: &str = "scriptpack loader";

/// Literal values interpolated into the emitted program.
#[derive(Debug, Clone)]
pub struct LoaderParams {
    /// Scripts root, relative to the game directory (e.g. `Scripts`).
    pub scripts_path: String,
    /// Manifest file name inside the scripts root (e.g. `load_order.txt`).
    pub manifest_name: String,
    /// Crash artifact path, relative to the game directory.
    pub crash_log_path: String,
    /// Prefix marking a manifest line as disabled.
    pub skip_char: char,
}

impl Default for LoaderParams {
    fn default() -> Self {
        Self {
            scripts_path: "Scripts".to_string(),
            manifest_name: "load_order.txt".to_string(),
            crash_log_path: "scriptpack_crash.dat".to_string(),
            skip_char: '#',
        }
    }
}

/// Build the loader as a ready-to-encode bundle entry, tagged with the
/// reserved section id.
pub fn loader_entry(params: &LoaderParams) -> BundleEntry {
    let entry = BundleEntry::new(LOADER_SECTION_ID, LOADER_SECTION_NAME, loader_program(params));
    debug!(section_id = entry.section_id, "Loader entry emitted");
    entry
}

/// Emit the loader program text with `params` baked in as literals.
pub fn loader_program(params: &LoaderParams) -> String {
    format!(
        r#"# {name}
# Reads the load-order manifest and loads every listed script file.
# Generated file: edits are discarded on the next bundle write.
module ScriptpackLoader
  SCRIPTS_PATH = '{scripts}'
  LOAD_ORDER = '{manifest}'
  CRASH_LOG = '{crash}'
  SKIP = '{skip}'

  def self.run
    order = File.join(SCRIPTS_PATH, LOAD_ORDER)
    raise LoadError, "missing load order: #{{order}}" unless File.exist?(order)
    File.readlines(order).each do |line|
      entry = line.strip
      next if entry.empty? || entry.start_with?(SKIP)
      path = File.join(SCRIPTS_PATH, entry)
      next if File.directory?(path)
      Kernel.send(:load, path)
    end
  rescue SystemExit
    raise
  rescue Exception => e
    dump_crash(e)
    raise
  end

  def self.dump_crash(error)
    artifact = {{
      'type' => error.class.name,
      'mesg' => error.message.to_s,
      'back' => (error.backtrace || [])
    }}
    File.open(CRASH_LOG, 'wb') {{ |f| f.write(Marshal.dump(artifact)) }}
  rescue SystemCallError
    # Crash reporting is best effort.
  end
end

ScriptpackLoader.run
"#,
        name = LOADER_SECTION_NAME,
        scripts = params.scripts_path,
        manifest = params.manifest_name,
        crash = params.crash_log_path,
        skip = params.skip_char,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_entry_uses_reserved_id() {
        let entry = loader_entry(&LoaderParams::default());
        assert!(entry.is_loader());
        assert_eq!(entry.name, LOADER_SECTION_NAME);
    }

    #[test]
    fn test_loader_program_embeds_params() {
        let params = LoaderParams {
            scripts_path: "Data/Scripts".to_string(),
            manifest_name: "order.txt".to_string(),
            crash_log_path: "crash.dat".to_string(),
            skip_char: '!',
        };
        let text = loader_program(&params);
        assert!(text.contains("SCRIPTS_PATH = 'Data/Scripts'"));
        assert!(text.contains("LOAD_ORDER = 'order.txt'"));
        assert!(text.contains("CRASH_LOG = 'crash.dat'"));
        assert!(text.contains("SKIP = '!'"));
    }

    #[test]
    fn test_loader_program_dumps_crash_fields() {
        let text = loader_program(&LoaderParams::default());
        for field in ["'type'", "'mesg'", "'back'"] {
            assert!(text.contains(field), "missing crash field {field}");
        }
    }

    #[test]
    fn test_loader_survives_codec_roundtrip() {
        let entry = loader_entry(&LoaderParams::default());
        let bytes = crate::encode(std::slice::from_ref(&entry)).unwrap();
        let decoded = crate::decode(&bytes).unwrap();
        assert_eq!(decoded, vec![entry]);
        assert!(!crate::is_extraction_needed(&decoded));
    }
}
