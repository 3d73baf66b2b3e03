//! Bounded-worker-pool extractor (C4).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{Result, WxapkgError};
use crate::model::{Container, ExtractStats};
use crate::transform::Transform;

/// Options controlling a single extraction pass.
pub struct ExtractOptions<'a> {
    pub output_dir: &'a Path,
    pub thread_count: usize,
    pub transforms: &'a HashMap<&'static str, Transform>,
    /// Called after every entry, with the running completed count and the
    /// fixed total. Guaranteed monotone and to reach `total` exactly once.
    pub on_progress: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

/// C4: write every entry in `container` under `options.output_dir`,
/// running the configured transform on matching extensions.
///
/// Per-entry I/O failures are logged via `tracing::warn!` and counted in
/// `ExtractStats::failed`; they do not abort the pass.
pub fn extract(container: &Container, options: &ExtractOptions) -> Result<ExtractStats> {
    fs::create_dir_all(options.output_dir)
        .map_err(|e| WxapkgError::io(options.output_dir, e))?;

    let total = container.entries.len();
    let completed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let by_extension: Mutex<HashMap<String, usize>> = Mutex::new(HashMap::new());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.thread_count.max(1))
        .build()
        .map_err(|e| WxapkgError::io(options.output_dir, std::io::Error::other(e)))?;

    pool.install(|| {
        use rayon::prelude::*;
        container.entries.par_iter().for_each(|entry| {
            let result = write_entry(container, entry, options.output_dir, options.transforms);

            match result {
                Ok(extension) => {
                    let mut map = by_extension.lock().unwrap();
                    *map.entry(extension).or_insert(0) += 1;
                }
                Err(err) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(entry = %entry.name, error = %err, "failed to extract entry");
                }
            }

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = options.on_progress {
                cb(done, total);
            }
        });
    });

    Ok(ExtractStats {
        total,
        by_extension: by_extension.into_inner().unwrap().into_iter().collect(),
        failed: failed.load(Ordering::Relaxed),
    })
}

fn write_entry(
    container: &Container,
    entry: &crate::model::ArchiveEntry,
    output_dir: &Path,
    transforms: &HashMap<&'static str, Transform>,
) -> Result<String> {
    let start = entry.offset as usize;
    let end = start + entry.size as usize;
    let raw = &container.plaintext[start..end];

    let dest = output_dir.join(entry.relative_path());
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| WxapkgError::io(parent, e))?;
    }

    let extension = dest
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    let bytes = transforms
        .get(extension.as_str())
        .and_then(|transform| transform(raw))
        .unwrap_or_else(|| raw.to_vec());

    fs::write(&dest, &bytes).map_err(|e| WxapkgError::io(&dest, e))?;

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container;
    use crate::model::ArchiveEntry;

    fn fixture_container() -> Container {
        let plaintext = b"{\"a\":1}function(){}<div></div>raw".to_vec();
        let entries = vec![
            ArchiveEntry {
                name: "/app.json".into(),
                offset: 0,
                size: 8,
            },
            ArchiveEntry {
                name: "/index.js".into(),
                offset: 8,
                size: 12,
            },
            ArchiveEntry {
                name: "/page.html".into(),
                offset: 20,
                size: 11,
            },
            ArchiveEntry {
                name: "/data.bin".into(),
                offset: 31,
                size: 3,
            },
        ];
        Container { entries, plaintext }
    }

    #[test]
    fn extracts_every_entry_and_counts_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let container = fixture_container();
        let transforms = crate::transform::default_registry();
        let options = ExtractOptions {
            output_dir: dir.path(),
            thread_count: 2,
            transforms: &transforms,
            on_progress: None,
        };

        let stats = extract(&container, &options).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.by_extension.get(".json"), Some(&1));
        assert_eq!(stats.by_extension.get(".js"), Some(&1));
        assert_eq!(stats.by_extension.get(".html"), Some(&1));
        assert!(dir.path().join("app.json").exists());
        assert!(dir.path().join("data.bin").exists());
    }

    #[test]
    fn progress_callback_is_monotone_and_reaches_total() {
        let dir = tempfile::tempdir().unwrap();
        let container = fixture_container();
        let transforms = crate::transform::disabled_registry();
        let seen: Mutex<Vec<usize>> = Mutex::new(Vec::new());
        let cb = |done: usize, _total: usize| {
            seen.lock().unwrap().push(done);
        };
        let options = ExtractOptions {
            output_dir: dir.path(),
            thread_count: 4,
            transforms: &transforms,
            on_progress: Some(&cb),
        };

        let stats = extract(&container, &options).unwrap();
        let mut values = seen.into_inner().unwrap();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert_eq!(stats.total, 4);
    }

    #[test]
    fn strips_leading_slash_from_entry_paths() {
        let mut header = Vec::new();
        header.push(container::FIRST_MARK);
        header.extend_from_slice(&0u32.to_be_bytes());
        header.extend_from_slice(&0u32.to_be_bytes());
        header.extend_from_slice(&0u32.to_be_bytes());
        header.push(container::LAST_MARK);
        header.extend_from_slice(&1u32.to_be_bytes());
        let name = "/a/b.txt";
        header.extend_from_slice(&(name.len() as u32).to_be_bytes());
        header.extend_from_slice(name.as_bytes());

        let data_offset = header.len() as u32 + 8;
        header.extend_from_slice(&data_offset.to_be_bytes());
        header.extend_from_slice(&3u32.to_be_bytes());
        header.extend_from_slice(b"xyz");

        let container = container::parse(header).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let transforms = crate::transform::disabled_registry();
        let options = ExtractOptions {
            output_dir: dir.path(),
            thread_count: 1,
            transforms: &transforms,
            on_progress: None,
        };
        extract(&container, &options).unwrap();
        assert!(dir.path().join("a").join("b.txt").exists());
    }
}
