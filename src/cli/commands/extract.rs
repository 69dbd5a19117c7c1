//! Single-document extraction command.

use std::path::Path;

use console::style;

use crate::cli::helpers::{
    default_output_dir, output_stem, render_structured_info, save_faces, save_result_json,
    settings_with_api_key,
};
use crate::config::Settings;
use crate::services::{Pipeline, ProcessOptions};

/// Process one document and write its result and face crops to disk.
pub async fn cmd_extract(
    settings: &Settings,
    file: &Path,
    output_dir: Option<&Path>,
    json_only: bool,
    skip_faces: bool,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let settings = settings_with_api_key(settings, api_key);
    let pipeline = Pipeline::from_settings(&settings)?;

    if !json_only {
        println!("{} Processing {}", style("→").cyan(), file.display());
    }

    let result = pipeline
        .process(file, ProcessOptions { skip_faces })
        .await;

    let out_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(file));
    let stem = output_stem(file);
    let json_path = save_result_json(&result, &out_dir, &stem)?;

    if !result.success {
        let error = result.error.as_deref().unwrap_or("unknown error");
        if !json_only {
            eprintln!("{} Processing failed: {}", style("✗").red(), error);
        }
        anyhow::bail!("Processing failed: {}", error);
    }

    let face_paths = save_faces(&result, &out_dir)?;

    if json_only {
        println!("{}", json_path.display());
        return Ok(());
    }

    if let Some(doc_type) = result.document_type {
        println!("  Document type: {}", style(doc_type).bold());
    }
    println!("  Faces found:   {}", result.face_count);
    for path in &face_paths {
        println!("    {} {}", style("✓").green(), path.display());
    }

    if let Some(ref analysis) = result.extracted_info {
        if !analysis.api_available {
            println!(
                "\n  {} AI analysis unavailable{}",
                style("!").yellow(),
                analysis
                    .error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            );
        }
        if let Some(ref info) = analysis.structured_info {
            let rendered = render_structured_info(info);
            if !rendered.is_empty() {
                println!("\n{}", style("Extracted Information").bold());
                println!("{}", "-".repeat(50));
                print!("{}", rendered);
            }
        }
    }

    println!(
        "\n{} Results saved to {}",
        style("✓").green(),
        json_path.display()
    );
    Ok(())
}
