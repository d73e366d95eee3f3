//! Convert a `.mat` file to JSON (plus a gzipped twin) for browser loading.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use hsi_tools::convert::{convert, ConversionReport};

#[derive(Parser)]
#[command(
    name = "mat2json",
    about = "Convert .mat files to JSON format for easier loading in browser",
    after_help = "Examples:\n    mat2json Truth_scene01.mat\n    mat2json mask.mat"
)]
struct Cli {
    /// Path to the .mat file to convert.
    mat_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let Some(mat_file) = cli.mat_file else {
        print_usage();
        return ExitCode::FAILURE;
    };

    match convert(&mat_file) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Full context chain, converted to a non-zero exit instead of a
            // panic so scripted callers see a clean failure.
            log::error!("error converting file: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("Usage: mat2json <path-to-mat-file>");
    println!();
    println!("Available .mat files in current directory:");
    if let Ok(entries) = std::fs::read_dir(".") {
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".mat"))
            .collect();
        names.sort();
        for name in names {
            println!("  {name}");
        }
    }
}

fn print_report(report: &ConversionReport) {
    let names: Vec<&str> = report.fields.iter().map(|f| f.name.as_str()).collect();
    println!("Found fields: {names:?}");

    const MB: f64 = 1024.0 * 1024.0;
    println!();
    println!("Conversion complete!");
    println!("  Original .mat: {:.2} MB", report.mat_bytes as f64 / MB);
    println!(
        "  JSON:          {:.2} MB ({:.1}%)",
        report.json_bytes as f64 / MB,
        report.ratio(report.json_bytes)
    );
    println!(
        "  JSON.gz:       {:.2} MB ({:.1}%)",
        report.gz_bytes as f64 / MB,
        report.ratio(report.gz_bytes)
    );

    for field in &report.fields {
        println!(
            "\n  Field '{}': shape {:?}, dtype f64",
            field.name, field.shape
        );
    }
}
