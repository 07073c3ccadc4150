//! Replication path set
//!
//! A run replicates a fixed base list followed by every tenant sound
//! directory found under the tenant root, minus reserved subdirectories
//! (call recordings and monitor output stay local to each node).

use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::Result;

/// Matches `<root>/<tenant>/<subdir>` with a valid tenant token and a
/// subdirectory that is not reserved.
#[derive(Debug, Clone)]
pub struct TenantPattern {
    regex: Regex,
    excluded: Vec<String>,
}

impl TenantPattern {
    pub fn new(root: &Path, excluded: &[String]) -> Result<Self> {
        let root = root.to_string_lossy();
        let root = root.trim_end_matches('/');
        let regex = Regex::new(&format!(
            r"^{}/([a-z0-9][A-Za-z0-9-]*)/([^/]+)$",
            regex::escape(root)
        ))?;
        Ok(Self {
            regex,
            excluded: excluded.to_vec(),
        })
    }

    /// Check whether a candidate path should be replicated
    pub fn matches(&self, path: &Path) -> bool {
        let Some(path) = path.to_str() else {
            return false;
        };
        match self.regex.captures(path) {
            Some(caps) => {
                let subdir = &caps[2];
                !self.excluded.iter().any(|e| e == subdir)
            }
            None => false,
        }
    }
}

/// Keep only the candidates that match the tenant pattern, preserving order
pub fn filter_tenant_candidates<I>(root: &Path, candidates: I, excluded: &[String]) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = PathBuf>,
{
    let pattern = TenantPattern::new(root, excluded)?;
    Ok(candidates
        .into_iter()
        .filter(|path| {
            let keep = pattern.matches(path);
            if !keep {
                tracing::trace!("Skipping tenant path {:?}", path);
            }
            keep
        })
        .collect())
}

/// Enumerate tenant subdirectories under `root`.
///
/// A missing root means no tenants and yields an empty list. Results are
/// sorted so repeated runs hand rsync the same argument list.
pub fn discover_tenant_paths(root: &Path, excluded: &[String]) -> Result<Vec<PathBuf>> {
    let tenants = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Tenant sounds root {:?} does not exist", root);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut candidates = Vec::new();
    for tenant in tenants {
        let tenant = tenant?.path();
        if !tenant.is_dir() {
            continue;
        }
        for subdir in std::fs::read_dir(&tenant)? {
            let subdir = subdir?.path();
            if subdir.is_dir() {
                candidates.push(subdir);
            }
        }
    }

    let mut paths = filter_tenant_candidates(root, candidates, excluded)?;
    paths.sort();
    Ok(paths)
}

/// Full ordered path set: base list, then discovered tenant paths
pub fn build_path_set(config: &SyncConfig) -> Result<Vec<PathBuf>> {
    let replication = &config.replication;
    let mut paths = replication.base_paths.clone();
    let discovered = discover_tenant_paths(
        &replication.tenant_sounds_root,
        &replication.excluded_subdirs,
    )?;
    tracing::debug!(
        "Path set: {} base paths, {} tenant paths",
        paths.len(),
        discovered.len()
    );
    paths.extend(discovered);
    Ok(paths)
}
