//! Bulk route loading from a folder tree.
//!
//! Every `*.routes.json` / `*.routes.toml` file under the root is a
//! pattern-keyed route map. Routes are registered under the file's folder,
//! relative to the root: `root/a/b/x.routes.json` registers `/a/b/<key>`.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::MoxyError;
use crate::routing::config::Routes;
use crate::routing::table::{AddRouteOptions, RouteTable};

const ROUTE_FILE_SUFFIXES: [&str; 2] = [".routes.json", ".routes.toml"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid route in {path}: {source}")]
    Route {
        path: PathBuf,
        #[source]
        source: MoxyError,
    },
}

/// Whether `path` names a route file.
pub fn is_route_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| ROUTE_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
        .unwrap_or(false)
}

/// Parse a single route file.
pub fn read_routes_file(path: &Path) -> Result<Routes, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|source| LoadError::Toml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(&content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Route prefix for a file: its folder relative to `root`.
pub fn route_prefix(root: &Path, file: &Path) -> String {
    let folder = file.parent().unwrap_or(root);
    let relative = folder.strip_prefix(root).unwrap_or(folder);

    relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .fold(String::new(), |mut prefix, segment| {
            prefix.push('/');
            prefix.push_str(segment);
            prefix
        })
}

/// Route files under `root`, breadth first, sorted by name within a folder.
pub fn find_route_files(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut queue = VecDeque::from([root.to_path_buf()]);
    let mut found = Vec::new();

    while let Some(dir) = queue.pop_front() {
        let mut entries = fs::read_dir(&dir)
            .map_err(|source| LoadError::Io {
                path: dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect::<Vec<_>>();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                queue.push_back(path);
            } else if is_route_file(&path) {
                found.push(path);
            }
        }
    }

    Ok(found)
}

/// Load every route file under `root` into `table`. Returns the number of
/// files loaded.
pub fn load_routes_from_folder(table: &RouteTable, root: &Path) -> Result<usize, LoadError> {
    let files = find_route_files(root)?;

    for file in &files {
        let routes = read_routes_file(file)?;
        let prefix = route_prefix(root, file);
        let count = routes.len();

        table
            .add_routes(&prefix, routes, AddRouteOptions::default())
            .map_err(|source| LoadError::Route {
                path: file.clone(),
                source,
            })?;

        tracing::info!(file = %file.display(), prefix = %prefix, routes = count, "Loaded route file");
    }

    Ok(files.len())
}
