//! Source tree watching via polling.
//!
//! Instead of platform file notifications, the watcher takes a size+mtime
//! snapshot of the source directory every poll interval and triggers a
//! rebuild when the snapshot moves. Cheap enough for the small script trees
//! this tool targets, and it behaves the same on every OS and on network
//! mounts.

use crate::build;
use crate::config::Config;
use crate::upload::Uploader;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    mtime: SystemTime,
}

type SourceSnapshot = BTreeMap<PathBuf, FileStamp>;

/// Poll the source tree, rebuilding and uploading whenever it changes.
///
/// The first pass always builds, so starting the watcher uploads the current
/// state once before settling into change detection. Runs until `shutdown`
/// is cancelled.
pub async fn run(config: &Config, uploader: &mut Uploader, shutdown: CancellationToken) {
    let interval = Duration::from_millis(config.watch.interval_ms);
    info!(
        "Watching {} (poll every {}ms)",
        config.src_dir().display(),
        config.watch.interval_ms
    );

    let mut last: Option<SourceSnapshot> = None;

    loop {
        match scan_sources(config) {
            Ok(snapshot) => {
                if last.as_ref() != Some(&snapshot) {
                    if last.is_some() {
                        info!("Source change detected, rebuilding");
                    }
                    let bundles = build::build_all(config).await;
                    uploader.process_bundles(&bundles, config);
                    last = Some(snapshot);
                }
            }
            Err(e) => {
                error!("Could not scan {}: {}", config.src_dir().display(), e);
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Watch loop stopped");
}

/// Stamp every file under the source directory.
///
/// Excluded names are pruned wherever they appear, and the dist directory is
/// skipped even when it lives inside the source tree so our own build output
/// never retriggers a rebuild.
fn scan_sources(config: &Config) -> io::Result<SourceSnapshot> {
    let src = config.src_dir();
    let dist = config.dist_dir();
    let mut snapshot = SourceSnapshot::new();

    let walker = WalkDir::new(&src).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        if entry.path() == dist {
            return false;
        }
        !is_excluded(&entry.file_name().to_string_lossy(), &config.watch.exclude)
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry.metadata()?;
        let mtime = meta.modified()?;
        snapshot.insert(
            entry.into_path(),
            FileStamp {
                len: meta.len(),
                mtime,
            },
        );
    }

    Ok(snapshot)
}

fn is_excluded(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| p == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use std::fs;
    use tempfile::TempDir;

    fn load(dir: &TempDir, config_toml: &str) -> Config {
        let path = dir.path().join("al-uploader.toml");
        fs::write(&path, config_toml).unwrap();
        Config::from_file(&path).unwrap()
    }

    fn basic_config(dir: &TempDir) -> Config {
        load(
            dir,
            r#"
            [build]
            command = ["sh", "-c", "cp {entry} {output}"]

            [watch]
            interval_ms = 25

            [[scripts]]
            entry = "src/ranger.ts"
            name = "ranger"
            slot = 1
            "#,
        )
    }

    #[test]
    fn test_scan_sources_stamps_files() {
        let dir = TempDir::new().unwrap();
        let config = basic_config(&dir);
        fs::create_dir_all(dir.path().join("src/node_modules")).unwrap();
        fs::write(dir.path().join("src/ranger.ts"), "attack(target);").unwrap();
        fs::write(dir.path().join("src/node_modules/dep.js"), "x").unwrap();

        let root = dir.path().canonicalize().unwrap();
        let snapshot = scan_sources(&config).unwrap();
        let stamp = snapshot.get(&root.join("src/ranger.ts")).unwrap();
        assert_eq!(stamp.len, "attack(target);".len() as u64);
        // Default excludes prune node_modules wherever it appears.
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_scan_detects_content_change_by_size() {
        let dir = TempDir::new().unwrap();
        let config = basic_config(&dir);
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/ranger.ts"), "attack(target);").unwrap();

        let before = scan_sources(&config).unwrap();
        fs::write(dir.path().join("src/ranger.ts"), "attack(target); heal();").unwrap();
        let after = scan_sources(&config).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_scan_detects_added_and_removed_files() {
        let dir = TempDir::new().unwrap();
        let config = basic_config(&dir);
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/ranger.ts"), "attack(target);").unwrap();

        let one = scan_sources(&config).unwrap();
        fs::write(dir.path().join("src/priest.ts"), "heal(target);").unwrap();
        let two = scan_sources(&config).unwrap();
        assert_ne!(one, two);

        fs::remove_file(dir.path().join("src/priest.ts")).unwrap();
        let three = scan_sources(&config).unwrap();
        assert_eq!(one, three);
    }

    #[test]
    fn test_scan_skips_dist_inside_source_tree() {
        let dir = TempDir::new().unwrap();
        let config = load(
            &dir,
            r#"
            [build]
            src_dir = "."
            command = ["true"]

            [[scripts]]
            entry = "ranger.ts"
            name = "ranger"
            slot = 1
            "#,
        );
        fs::write(dir.path().join("ranger.ts"), "attack(target);").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/ranger.js"), "compiled").unwrap();

        let snapshot = scan_sources(&config).unwrap();
        assert!(snapshot.keys().any(|p| p.ends_with("ranger.ts")));
        assert!(!snapshot.keys().any(|p| p.ends_with("dist/ranger.js")));
    }

    #[tokio::test]
    async fn test_run_rebuilds_when_source_changes() {
        let dir = TempDir::new().unwrap();
        let config = basic_config(&dir);
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/ranger.ts"), "attack(target);").unwrap();

        // Nothing listens here, so uploads fail fast without network access.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut uploader = Uploader::new(ApiClient::new(format!("http://{}", port), "testtoken"));

        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        let source = dir.path().join("src/ranger.ts");
        let output = dir.path().join("dist/ranger.js");
        let watched = output.clone();

        tokio::spawn(async move {
            // Let the initial build land, then edit the source.
            tokio::time::sleep(Duration::from_millis(100)).await;
            fs::write(&source, "attack(target); use_skill('supershot');").unwrap();

            for _ in 0..80 {
                tokio::time::sleep(Duration::from_millis(25)).await;
                if fs::read_to_string(&watched)
                    .map(|code| code.contains("supershot"))
                    .unwrap_or(false)
                {
                    break;
                }
            }
            canceller.cancel();
        });

        run(&config, &mut uploader, shutdown).await;

        let compiled = fs::read_to_string(&output).unwrap();
        assert!(compiled.contains("supershot"));
        uploader.wait_idle(Duration::from_secs(5)).await;
    }
}
