//! Tool and provider availability check.

use console::style;

use crate::config::Settings;
use crate::images::{CommandFaceDetector, FaceDetector};
use crate::ocr::tools::check_binary;
use crate::ocr::{OcrBackend, OcrConfig, TesseractBackend};

const POPPLER_TOOLS: &[&str] = &["pdftotext", "pdftoppm", "pdfimages", "pdfinfo"];

/// Report which external tools and analysis backends are usable.
pub async fn cmd_check(settings: &Settings) -> anyhow::Result<()> {
    println!("\n{}", style("Extraction Tools").bold());
    println!("{}", "-".repeat(50));

    for tool in POPPLER_TOOLS {
        let status = if check_binary(tool) {
            style("✓ found").green()
        } else {
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    let tesseract = TesseractBackend::with_config(OcrConfig {
        language: settings.ocr.language.clone(),
        max_pages: settings.ocr.max_pages,
    });
    let tesseract_status = if !settings.ocr.enabled {
        style("○ disabled").yellow()
    } else if tesseract.is_available() {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", "tesseract", tesseract_status);
    if settings.ocr.enabled && !tesseract.is_available() {
        println!("                  {}", style(tesseract.availability_hint()).dim());
    }

    let detector = CommandFaceDetector::from_settings(&settings.faces);
    let detector_status = if !settings.faces.enabled {
        style("○ disabled").yellow()
    } else if detector.is_available() {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<15} {}", detector.name(), detector_status);

    println!("\n{}", style("Analysis").bold());
    println!("{}", "-".repeat(50));

    let llm = &settings.llm;
    if llm.is_configured() {
        println!(
            "  {:<15} {} ({}, vision: {})",
            llm.provider_name(),
            style("✓ configured").green(),
            llm.model,
            llm.vision_model()
        );
    } else {
        println!(
            "  {:<15} {}",
            llm.provider_name(),
            style("✗ not configured").red()
        );
        println!("                  {}", style(llm.availability_hint()).dim());
    }

    println!();
    Ok(())
}
