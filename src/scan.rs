//! Dump directory enumeration and classification.

use crate::filename::{self, ParsedDumpName};
use std::fs;
use std::path::{Path, PathBuf};

/// Classified contents of a dump directory.
#[derive(Debug, Default)]
pub struct DirListing {
    /// Finished dumps, parsed from their filenames
    pub dumps: Vec<ParsedDumpName>,
    /// Leftover temporary files from interrupted writes
    pub stray_tmp: Vec<PathBuf>,
}

/// Enumerate `directory` and sort its regular files into finished dumps and
/// stray temporaries. Unrelated and malformed names are skipped.
///
/// Best effort: per-entry failures are logged and skipped, and an unreadable
/// directory yields whatever was classified before the failure. The next
/// scan cycle retries.
#[must_use]
pub fn classify_dir(directory: &Path) -> DirListing {
    let mut listing = DirListing::default();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::error!(
                directory = %directory.display(),
                %err,
                "failed to open dump directory"
            );
            return listing;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(
                    directory = %directory.display(),
                    %err,
                    "skipping unreadable directory entry"
                );
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if filename::is_tmp_name(name) {
            listing.stray_tmp.push(path);
        } else if let Some(dump) = filename::parse_dump_name(name) {
            listing.dumps.push(dump);
        }
    }

    listing
}
