//! Batch directory processing command.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use crate::cli::helpers::{output_stem, save_faces, save_result_json, settings_with_api_key};
use crate::config::Settings;
use crate::services::{Pipeline, ProcessOptions};
use crate::utils::file_extension;

/// Process every batch-eligible file under `dir`.
///
/// A failing document is counted and reported; the batch carries on.
/// With `json_only`, each saved JSON path is printed on its own line and
/// failures go to stderr.
pub async fn cmd_batch(
    settings: &Settings,
    dir: &Path,
    output_dir: Option<&Path>,
    recursive: bool,
    skip_faces: bool,
    json_only: bool,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let settings = settings_with_api_key(settings, api_key);
    let output_dir = batch_output_dir(&settings, output_dir);

    let files = collect_batch_files(&settings, dir, recursive);
    if files.is_empty() {
        if json_only {
            eprintln!("No supported documents found in {}", dir.display());
        } else {
            println!(
                "{} No supported documents found in {}",
                style("!").yellow(),
                dir.display()
            );
        }
        return Ok(());
    }

    let pipeline = Pipeline::from_settings(&settings)?;
    std::fs::create_dir_all(&output_dir)?;

    if !json_only {
        println!(
            "{} Processing {} documents from {}",
            style("→").cyan(),
            files.len(),
            dir.display()
        );
    }

    let pb = if json_only {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        pb
    };

    let report_failure = |name: &str, error: &str| {
        if json_only {
            eprintln!("{}: {}", name, error);
        } else {
            pb.println(format!("  {} {}: {}", style("✗").red(), name, error));
        }
    };

    let mut used_names = HashSet::new();
    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut faces = 0usize;

    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        pb.set_message(name.clone());

        let stem = unique_output_name(file, &mut used_names);
        let doc_dir = output_dir.join(&stem);
        let result = pipeline
            .process(file, ProcessOptions { skip_faces })
            .await;

        let saved = save_result_json(&result, &doc_dir, &stem)
            .and_then(|json_path| save_faces(&result, &doc_dir).map(|_| json_path));

        match (result.success, saved) {
            (true, Ok(json_path)) => {
                processed += 1;
                faces += result.face_count;
                if json_only {
                    println!("{}", json_path.display());
                }
            }
            (false, _) => {
                failed += 1;
                report_failure(&name, result.error.as_deref().unwrap_or("unknown error"));
            }
            (true, Err(e)) => {
                failed += 1;
                report_failure(&name, &e.to_string());
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    if json_only {
        return Ok(());
    }

    println!(
        "{} Batch complete: {} processed, {} failed, {} faces extracted",
        style("✓").green(),
        processed,
        failed,
        faces
    );
    println!("  Results saved to {}", output_dir.display());
    Ok(())
}

/// The `-o` directory when given, else the configured `output_dir`.
fn batch_output_dir(settings: &Settings, output_dir: Option<&Path>) -> PathBuf {
    output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.output_dir.clone())
}

/// Files under `dir` with a batch extension, sorted by path.
fn collect_batch_files(settings: &Settings, dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(dir).min_depth(1);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| settings.is_batch_candidate(path))
        .collect();
    files.sort();
    files
}

/// Output directory name for a file; repeats get the extension appended.
fn unique_output_name(file: &Path, used: &mut HashSet<String>) -> String {
    let stem = output_stem(file);
    let mut name = stem.clone();
    if used.contains(&name) {
        let ext = file
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(file_extension)
            .unwrap_or_default();
        name = format!("{}_{}", stem, ext);
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{}_{}_{}", stem, ext, n);
            n += 1;
        }
    }
    used.insert(name.clone());
    name
}
