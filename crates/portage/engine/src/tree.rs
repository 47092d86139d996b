//! File trees on disk: listing, copying and comparing checkouts
//!
//! Only regular files count. Symbolic links are never followed, so a link
//! cycle inside a checkout cannot make a walk fail or loop.

use portage_types::{PortageError, PortageResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Regular files under `root`, keyed by `/`-separated relative path
pub fn list_files(root: &Path) -> PortageResult<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PortageError::repository(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative, entry.into_path());
    }
    Ok(files)
}

/// Contents of every regular file under `root`
pub fn read_tree(root: &Path) -> PortageResult<BTreeMap<String, Vec<u8>>> {
    list_files(root)?
        .into_iter()
        .map(|(relative, path)| Ok((relative, std::fs::read(&path)?)))
        .collect()
}

/// Copy every regular file under `from` into `to`, replacing `to`
pub fn copy_tree(from: &Path, to: &Path) -> PortageResult<()> {
    if to.exists() {
        std::fs::remove_dir_all(to)?;
    }
    std::fs::create_dir_all(to)?;
    for (relative, source) in list_files(from)? {
        let target = to.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &target)?;
    }
    Ok(())
}

/// Relative paths whose presence or content differs between two trees
pub fn diff_trees(
    left: &BTreeMap<String, Vec<u8>>,
    right: &BTreeMap<String, Vec<u8>>,
) -> Vec<String> {
    let mut differences: Vec<String> = left
        .iter()
        .filter(|(path, content)| right.get(*path) != Some(*content))
        .map(|(path, _)| path.clone())
        .collect();
    differences.extend(
        right
            .keys()
            .filter(|path| !left.contains_key(*path))
            .cloned(),
    );
    differences.sort();
    differences
}
