//! squatwatch - Typosquatting detector for crates.io.
//!
//! CLI entry point.

use clap::Parser;
use squatwatch::generate::{BitFlipGenerator, TransformGenerator};
use squatwatch::notify::ConsoleOutput;
use squatwatch::{
    Commands, Config, Detector, GeneratedVariant, RunReport, ScanConfig, VariantsConfig,
};
use std::fs;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when at least one suspicious crate is reported.
const EXIT_SQUATS_FOUND: u8 = 42;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("squatwatch=debug,info")
    } else {
        EnvFilter::new("squatwatch=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match config.command.clone() {
        Commands::Scan(scan_config) => match run_scan(scan_config, &config).await {
            Ok(report) if !report.matches.is_empty() => ExitCode::from(EXIT_SQUATS_FOUND),
            Ok(_) => ExitCode::SUCCESS,
            Err(code) => code,
        },
        Commands::Variants(variants_config) => {
            if let Err(code) = run_variants(variants_config) {
                return code;
            }
            ExitCode::SUCCESS
        }
    }
}

async fn run_scan(scan_config: ScanConfig, global_config: &Config) -> Result<RunReport, ExitCode> {
    let mut detector = match Detector::new(scan_config.clone(), global_config.verbose) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to create detector: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    // Configure Telegram if requested
    if scan_config.telegram {
        if let (Some(ref token), Some(ref chat_id)) =
            (&global_config.telegram_token, &global_config.telegram_chat_id)
        {
            detector = match detector.with_telegram(token, chat_id) {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to configure Telegram: {}", e);
                    return Err(ExitCode::FAILURE);
                }
            };
        } else {
            error!(
                "Telegram notifications requested but {} and/or {} not set",
                "SQUATWATCH_TELEGRAM_TOKEN", "SQUATWATCH_TELEGRAM_CHAT_ID"
            );
            return Err(ExitCode::FAILURE);
        }
    }

    let report = match detector.run().await {
        Ok(r) => r,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if let Some(ref output_path) = scan_config.output {
        let json = serde_json::to_string_pretty(&report).unwrap_or_default();
        if let Err(e) = fs::write(output_path, &json) {
            error!("Failed to write output file: {}", e);
            return Err(ExitCode::FAILURE);
        }
        info!("Results written to: {:?}", output_path);
    } else {
        let console =
            ConsoleOutput::new(global_config.verbose, scan_config.json, scan_config.quiet);
        console.print_summary(&report);
    }

    Ok(report)
}

fn run_variants(config: VariantsConfig) -> Result<(), ExitCode> {
    let transforms = TransformGenerator::without(&config.disabled_rules);
    let mut variants: Vec<GeneratedVariant> = transforms.variants(&config.name).collect();
    if !config.no_bitflips {
        let mut seen: std::collections::HashSet<String> =
            variants.iter().map(|v| v.name.clone()).collect();
        variants.extend(
            BitFlipGenerator::new()
                .variants(&config.name)
                .into_iter()
                .filter(|v| seen.insert(v.name.clone())),
        );
    }

    if config.json {
        match serde_json::to_string_pretty(&variants) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize variants: {}", e);
                return Err(ExitCode::FAILURE);
            }
        }
    } else {
        for variant in &variants {
            println!("{:<14} {}", variant.rule.as_str(), variant.name);
        }
    }

    Ok(())
}
