//! Upload orchestration: decide which bundles changed and push them.
//!
//! Uploads are last-write-wins per bundle. Dispatching a new upload for a
//! name that already has one in flight aborts the old request before the
//! new one is sent, never queueing behind it; a stale bundle must not land
//! after a newer one.

pub mod tracker;

use crate::api::types::SaveCodeArguments;
use crate::api::ApiClient;
use crate::build::Bundle;
use crate::config::Config;
use crate::fingerprint::FingerprintTable;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracker::InflightUploads;

/// What one pass over the built bundles did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub changed: usize,
    pub unchanged: usize,
}

/// Tracks bundle fingerprints across build cycles and owns the in-flight
/// upload tasks. Only the driving loop touches this, so no locking.
pub struct Uploader {
    client: Arc<ApiClient>,
    fingerprints: FingerprintTable,
    inflight: InflightUploads,
}

impl Uploader {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client: Arc::new(client),
            fingerprints: FingerprintTable::new(),
            inflight: InflightUploads::new(),
        }
    }

    /// Compare each bundle against its last seen fingerprint and dispatch
    /// uploads for the ones that changed. A bundle seen for the first time
    /// always counts as changed.
    pub fn process_bundles(&mut self, bundles: &[Bundle], config: &Config) -> CycleStats {
        let mut stats = CycleStats::default();

        for bundle in bundles {
            let Some(script) = config.script_for(&bundle.name) else {
                // Built from an entry that has since left the config.
                warn!("No script entry for bundle {}, not uploading", bundle.name);
                continue;
            };

            if self.fingerprints.observe(&bundle.name, &bundle.hash) {
                stats.changed += 1;
                self.dispatch(bundle, script.slot);
            } else {
                stats.unchanged += 1;
                debug!("{} unchanged, skipping upload", bundle.name);
            }
        }

        if stats.changed > 0 {
            info!(
                "Uploading {} changed bundle(s), {} unchanged",
                stats.changed, stats.unchanged
            );
        }

        stats
    }

    fn dispatch(&mut self, bundle: &Bundle, slot: u32) {
        // Abort the predecessor before the replacement is spawned; two
        // uploads for one name must never be live at once.
        if self.inflight.abort(&bundle.name).is_some() {
            info!("Aborted ongoing upload for {}", bundle.name);
        }

        let handle = tokio::spawn(upload_bundle(
            Arc::clone(&self.client),
            bundle.name.clone(),
            slot,
            bundle.code_file.clone(),
        ));
        self.inflight.track(&bundle.name, handle);
    }

    /// Let outstanding uploads finish before shutdown, up to `grace` total.
    pub async fn wait_idle(&mut self, grace: Duration) {
        let handles = self.inflight.drain();
        if handles.is_empty() {
            return;
        }

        debug!("Waiting for {} outstanding upload(s)", handles.len());
        let deadline = tokio::time::Instant::now() + grace;
        for handle in handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Upload task failed: {}", e),
                Err(_) => {
                    warn!("Upload still running after {:?}, giving up", grace);
                    return;
                }
            }
        }
    }
}

/// One upload, run as its own task so it can be aborted mid-request.
async fn upload_bundle(client: Arc<ApiClient>, name: String, slot: u32, code_file: PathBuf) {
    let code = match tokio::fs::read_to_string(&code_file).await {
        Ok(code) => code,
        Err(e) => {
            error!("Could not read {}: {}", code_file.display(), e);
            return;
        }
    };

    let args = SaveCodeArguments::new(&name, slot, code);
    match client.save_code(&args).await {
        Ok(reply) => info!("{}: {}", code_file.display(), reply.message),
        Err(e) => error!("Upload failed for {}: {}", name, e),
    }
}
