//! Build driver: runs the external compiler and collects bundles.
//!
//! Compilation itself is delegated to whatever command the config names
//! (esbuild, tsc, webpack, …); this module renders the command template per
//! script entry, spawns the process, and turns the emitted files into a
//! fingerprinted `Bundle`.

use crate::config::{Config, ScriptEntry};
use crate::error::{Result, UploaderError};
use crate::fingerprint;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// A named, content-hashed build output.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub hash: String,
    /// Every file the compiler emitted for this entry (bundle, source map, …)
    pub files: Vec<PathBuf>,
    /// The compiled script that gets uploaded
    pub code_file: PathBuf,
}

/// Build every configured script entry.
///
/// Per-entry failures are logged and skipped so one broken script does not
/// block the others; the returned list holds the bundles that built.
pub async fn build_all(config: &Config) -> Vec<Bundle> {
    let started = Instant::now();
    let mut bundles = Vec::with_capacity(config.scripts.len());
    let mut failed = 0usize;

    for script in &config.scripts {
        match build_entry(config, script).await {
            Ok(bundle) => {
                info!(
                    "Built {} ({} files, hash {})",
                    bundle.name,
                    bundle.files.len(),
                    &bundle.hash[..8]
                );
                bundles.push(bundle);
            }
            Err(e) => {
                failed += 1;
                error!("Build failed for {}: {}", script.name, e);
            }
        }
    }

    info!(
        "Build finished: {} ok, {} failed in {}ms",
        bundles.len(),
        failed,
        started.elapsed().as_millis()
    );

    bundles
}

/// Compile one entry and collect its bundle.
pub async fn build_entry(config: &Config, script: &ScriptEntry) -> Result<Bundle> {
    let entry = config.entry_path(script);
    let output = output_path(config, &script.name);

    // The compiler is not guaranteed to create the dist directory.
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let argv: Vec<String> = config
        .build
        .command
        .iter()
        .map(|part| render_template(part, &entry, &output, &script.name))
        .collect();
    let program = argv[0].clone();

    debug!("Compiling {}: {:?}", script.name, argv);

    let out = Command::new(&program)
        .args(&argv[1..])
        .current_dir(config.root())
        .output()
        .await
        .map_err(|e| UploaderError::Build(format!("failed to run {}: {}", program, e)))?;

    if !out.status.success() {
        report_compiler_output(&script.name, &out.stderr);
        return Err(UploaderError::Build(format!(
            "{} exited with {}",
            program, out.status
        )));
    }

    if !output.exists() {
        return Err(UploaderError::Build(format!(
            "compiler produced no {}",
            output.display()
        )));
    }

    let files = collect_bundle_files(&output, &script.name)?;
    let hash = fingerprint::digest_files(&files)?;

    Ok(Bundle {
        name: script.name.clone(),
        hash,
        files,
        code_file: output,
    })
}

fn render_template(template: &str, entry: &Path, output: &Path, name: &str) -> String {
    template
        .replace("{entry}", &entry.to_string_lossy())
        .replace("{output}", &output.to_string_lossy())
        .replace("{name}", name)
}

fn output_path(config: &Config, name: &str) -> PathBuf {
    config
        .dist_dir()
        .join(config.build.filename.replace("{name}", name))
}

/// The primary output plus every sibling file the compiler emitted for this
/// bundle (source map, extra chunks), sorted.
///
/// Anchored on the compiled file itself: the fingerprint always covers the
/// uploaded content even when the filename template nests the output below
/// the dist directory.
fn collect_bundle_files(code_file: &Path, name: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = vec![code_file.to_path_buf()];

    if let Some(dir) = code_file.parent() {
        let prefix = format!("{}.", name);
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() || entry.path() == code_file {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Surface the compiler's own diagnostics line by line instead of one
/// unreadable blob.
fn report_compiler_output(name: &str, stderr: &[u8]) {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        error!("[{}] compiler failed without diagnostics", name);
        return;
    }
    for line in trimmed.lines() {
        error!("[{}] {}", name, line);
    }
}
