//! On-disk data layout.
//!
//! ```text
//! <root>/
//!   Poland/
//!     poland_universities.csv        store
//!     poland_universities_raw.json   raw fetch dump, merged into the store above
//!   China/
//!     china_universities.csv
//!     hk_universities.csv            sub-region store
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const STORE_SUFFIX: &str = "_universities.csv";
pub const RAW_SUFFIX: &str = "_universities_raw.json";

/// One source directory and the files found in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Directory name, used as the source identifier
    pub name: String,
    pub stores: Vec<PathBuf>,
    pub raw_dumps: Vec<PathBuf>,
}

/// List source directories under `root` in alphabetical order, skipping
/// hidden directories and the `exclude` file (the global catalog).
pub fn discover(root: &Path, exclude: &Path) -> Result<Vec<SourceDir>> {
    let dirs: Vec<PathBuf> = read_dir_sorted(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| !file_name(path).starts_with('.'))
        .collect();

    let mut sources = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let mut source = SourceDir {
            name: file_name(&dir).to_string(),
            stores: Vec::new(),
            raw_dumps: Vec::new(),
        };
        for path in read_dir_sorted(&dir)? {
            if !path.is_file() || path == exclude {
                continue;
            }
            let name = file_name(&path);
            if name.ends_with(STORE_SUFFIX) {
                source.stores.push(path);
            } else if name.ends_with(RAW_SUFFIX) {
                source.raw_dumps.push(path);
            }
        }
        sources.push(source);
    }
    Ok(sources)
}

/// Store file a raw dump merges into: `x_universities_raw.json` becomes
/// `x_universities.csv` in the same directory.
pub fn store_path_for_raw(raw: &Path) -> PathBuf {
    let name = file_name(raw);
    let stem = name.strip_suffix(RAW_SUFFIX).unwrap_or(name);
    raw.with_file_name(format!("{}{}", stem, STORE_SUFFIX))
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}
