//! Route folder watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::routing::loader::{is_route_file, load_routes_from_folder};
use crate::routing::RouteTable;

/// Reloads a route folder into the table whenever one of its route files
/// is created or modified.
pub struct RouteWatcher {
    roots: Vec<PathBuf>,
    table: Arc<RouteTable>,
}

impl RouteWatcher {
    pub fn new(roots: Vec<PathBuf>, table: Arc<RouteTable>) -> Self {
        Self { roots, table }
    }

    /// Start watching in the background. The returned watcher must be kept
    /// alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let roots = self.roots.clone();
        let table = self.table;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    for root in affected_roots(&roots, &event.paths) {
                        tracing::info!(root = %root.display(), "Route file change detected, reloading");
                        if let Err(e) = load_routes_from_folder(&table, root) {
                            tracing::error!(error = %e, "Failed to reload routes. Keeping current table.");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for root in &self.roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::info!(path = %root.display(), "Route watcher started");
        }

        Ok(watcher)
    }
}

/// Roots owning at least one changed route file, each listed once.
fn affected_roots<'a>(roots: &'a [PathBuf], changed: &[PathBuf]) -> Vec<&'a Path> {
    roots
        .iter()
        .filter(|root| {
            changed
                .iter()
                .any(|path| is_route_file(path) && path.starts_with(root.as_path()))
        })
        .map(PathBuf::as_path)
        .collect()
}
