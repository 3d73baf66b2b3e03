//! Orchestrator (C9): wire C1-C4 together across single-archive and
//! directory-root modes, resolving the identifier either explicitly or
//! from the input path.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::crypto;
use crate::error::{Result, WxapkgError};
use crate::extract::{extract, ExtractOptions};
use crate::model::ExtractStats;
use crate::transform::Transform;

static WXID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"wx[0-9a-f]{16}").unwrap());

/// Infer a wxid by matching the first `wx[0-9a-f]{16}` substring in `path`.
pub fn infer_identifier(path: &Path) -> Option<String> {
    let text = path.to_string_lossy();
    WXID_PATTERN
        .find(text.as_ref())
        .map(|m| m.as_str().to_string())
}

/// Resolve an identifier: the explicit value if given, otherwise inferred
/// from `path`. A missing identifier is run-fatal.
pub fn resolve_identifier(explicit: Option<&str>, path: &Path) -> Result<String> {
    if let Some(id) = explicit {
        return Ok(id.to_string());
    }
    infer_identifier(path).ok_or_else(|| WxapkgError::UnresolvedIdentifier(path.to_path_buf()))
}

/// Recursively enumerate `.wxapkg` files under `root` (or `root` itself if
/// it is already a `.wxapkg` file).
pub fn scan_wxapkg_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return if root.extension().and_then(|e| e.to_str()) == Some("wxapkg") {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("wxapkg"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Outcome of unpacking a single archive: which entries were decoded, or
/// the error that made the archive unrecoverable. An archive-level failure
/// never aborts the run (§4.10: `BadArchive` is archive-fatal-but-continue).
pub struct ArchiveOutcome {
    pub archive: PathBuf,
    pub result: Result<ExtractStats>,
}

/// C9 single-archive mode: decrypt, parse, and extract one `.wxapkg` file.
pub fn unpack_archive(
    archive_path: &Path,
    identifier: &str,
    output_dir: &Path,
    thread_count: usize,
    transforms: &std::collections::HashMap<&'static str, Transform>,
    on_progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> Result<ExtractStats> {
    let raw = fs::read(archive_path).map_err(|e| WxapkgError::io(archive_path, e))?;
    let plaintext = crypto::decrypt(identifier, &raw)?;
    let container = crate::container::parse(plaintext)?;

    let options = ExtractOptions {
        output_dir,
        thread_count,
        transforms,
        on_progress,
    };
    extract(&container, &options)
}

/// C9 directory-root mode: find every immediate child directory containing
/// `.wxapkg` files and unpack each into `output_dir/{subdir}/`. Archives
/// are processed sequentially so the configured worker width bounds total
/// in-flight threads across the whole run (§5).
pub fn unpack_directory_root(
    root: &Path,
    identifier: &str,
    output_dir: &Path,
    thread_count: usize,
    transforms: &std::collections::HashMap<&'static str, Transform>,
    mut on_archive: impl FnMut(&Path, &Result<ExtractStats>),
) -> Result<Vec<ArchiveOutcome>> {
    let mut outcomes = Vec::new();

    let entries = fs::read_dir(root).map_err(|e| WxapkgError::io(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| WxapkgError::io(root, e))?;
        if !entry.path().is_dir() {
            continue;
        }

        let archives = scan_wxapkg_files(&entry.path());
        if archives.is_empty() {
            continue;
        }

        let subdir_name = entry.file_name();
        let subdir_output = output_dir.join(&subdir_name);

        for archive in archives {
            let result = unpack_archive(
                &archive,
                identifier,
                &subdir_output,
                thread_count,
                transforms,
                None,
            );
            on_archive(&archive, &result);
            outcomes.push(ArchiveOutcome { archive, result });
        }
    }

    if outcomes.is_empty() {
        return Err(WxapkgError::NoArchives(root.to_path_buf()));
    }

    Ok(outcomes)
}
