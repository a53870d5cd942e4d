//! Form Scanner
//!
//! Command-line front end: prepare and enhance single scans, tune the
//! binarization threshold interactively, validate extracted field maps, and
//! process whole folders of scans into a record file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use form_scanner::batch::{CsvRecordSink, process_folder};
use form_scanner::config::{self, ScannerConfig};
use form_scanner::enhance::{AdjustmentParameters, binarize, enhance};
use form_scanner::ocr::TesseractRecognizer;
use form_scanner::prepare::{FormPreparer, TargetSize, load_image, save_image};
use form_scanner::tuner::run_tuner;
use form_scanner::validate::{FieldMap, validate_data};
use form_scanner::{logging, paths};

#[derive(Parser)]
#[command(name = "form-scanner")]
#[command(version, about = "Scanned request form normalization, OCR and validation", long_about = None)]
struct Cli {
    /// Config file (default: config.json next to the executable)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop a scan to its border and scale it to the canonical size
    Prepare {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,

        /// Border color name (overrides config)
        #[arg(long, value_name = "COLOR")]
        color: Option<String>,

        /// Target width in pixels (overrides config)
        #[arg(long, value_name = "PX")]
        width: Option<u32>,

        /// Target height in pixels (overrides config)
        #[arg(long, value_name = "PX")]
        height: Option<u32>,
    },

    /// Prepare a scan and apply contrast enhancement
    Enhance {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,

        /// Saturation boost (overrides config)
        #[arg(long, value_name = "N")]
        saturation: Option<u8>,

        /// CLAHE clip limit (overrides config)
        #[arg(long, value_name = "FLOAT")]
        clip_limit: Option<f32>,

        /// Also binarize with this threshold
        #[arg(long, value_name = "0-255")]
        threshold: Option<u8>,
    },

    /// Open the interactive brightness/contrast/threshold tuner
    Tune {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Tune on the raw scan instead of the prepared form
        #[arg(long)]
        raw: bool,

        /// Store the chosen brightness, contrast and threshold in the config file
        #[arg(long)]
        save: bool,
    },

    /// Validate a JSON object of field name -> value
    Validate {
        #[arg(value_name = "JSON")]
        input: PathBuf,
    },

    /// Process every scan in a folder into a CSV record file
    Process {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,

        /// Record file (default: output/records.csv next to the executable)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        // Write directly; the logger may not be installed yet
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join(logging::LOG_FILE_NAME);
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            use std::io::Write;
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

fn main() -> ExitCode {
    install_panic_hook();
    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Warning: could not create output directories: {}", e);
    }
    if let Err(e) = logging::init_logging(&paths::get_logs_dir(), cli.verbose) {
        eprintln!("Warning: {:#}", e);
    }

    config::init_config(cli.config.as_deref());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = config::get_config();

    match cli.command {
        Commands::Prepare {
            input,
            out,
            color,
            width,
            height,
        } => {
            let mut preparer = FormPreparer::from_config(config);
            if let Some(color) = color {
                preparer.border_color = color;
            }
            preparer.target_size = TargetSize::new(
                width.unwrap_or(preparer.target_size.width),
                height.unwrap_or(preparer.target_size.height),
            );

            let prepared = preparer.prepare_file(&input)?;
            save_image(&prepared.image, &out)?;
            info!(output = %out.display(), border = %prepared.border.describe(), "Prepared form written");
        }

        Commands::Enhance {
            input,
            out,
            saturation,
            clip_limit,
            threshold,
        } => {
            let prepared = FormPreparer::from_config(config).prepare_file(&input)?;
            let enhanced = enhance(
                &prepared.image,
                saturation.unwrap_or(config.saturation_boost),
                clip_limit.unwrap_or(config.clahe_clip_limit),
            );
            let output = match threshold {
                Some(t) => binarize(&enhanced, t),
                None => enhanced,
            };
            save_image(&output, &out)?;
            info!(output = %out.display(), "Enhanced form written");
        }

        Commands::Tune { input, raw, save } => {
            let image = if raw {
                load_image(&input)?
            } else {
                FormPreparer::from_config(config).prepare_file(&input)?.image
            };

            let params = run_tuner(image)?;
            println!(
                "brightness={} contrast={} threshold={}",
                params.brightness, params.contrast, params.threshold
            );

            if save {
                let path = cli.config.clone().unwrap_or_else(config::default_config_path);
                save_adjustment(config, &path, params)?;
            }
        }

        Commands::Validate { input } => {
            let contents = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let fields = parse_field_map(&contents)
                .with_context(|| format!("Failed to parse {}", input.display()))?;

            let result = validate_data(&fields);
            if result.is_valid() {
                println!("All fields valid");
            } else {
                for (field, message) in result.iter() {
                    println!("{}: {}", field, message);
                }
                return Ok(ExitCode::from(2));
            }
        }

        Commands::Process { folder, out } => {
            let recognizer = TesseractRecognizer::locate(config)?;
            let out = out.unwrap_or_else(paths::get_records_path);
            let mut sink = CsvRecordSink::open(&out)?;

            let mut last_reported = 0u8;
            let mut report = |pct: u8| {
                if pct >= last_reported.saturating_add(10) || pct == 100 {
                    info!("Progress: {}%", pct);
                    last_reported = pct;
                }
            };

            let summary = process_folder(&folder, config, &recognizer, &mut sink, Some(&mut report))?;

            println!(
                "Processed {} images: {} records added, {} failed, {} need review",
                summary.total_images,
                summary.records_added,
                summary.failed(),
                summary.needs_review
            );
            for (kind, count) in &summary.failures {
                println!("  {}: {}", kind.label(), count);
            }
            println!("Records: {}", sink.path().display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Accepts a JSON object whose values are strings, numbers or null.
/// Null reads as an empty value, which checked fields report.
fn parse_field_map(contents: &str) -> Result<FieldMap> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(contents)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| match value {
            serde_json::Value::String(s) => (name, s),
            serde_json::Value::Null => (name, String::new()),
            other => (name, other.to_string()),
        })
        .collect())
}

fn save_adjustment(current: &ScannerConfig, path: &Path, params: AdjustmentParameters) -> Result<()> {
    let mut updated = current.clone();
    updated.set_adjustment(params);
    updated
        .save(path)
        .with_context(|| format!("Failed to save config to {}", path.display()))?;
    info!(
        brightness = params.brightness,
        contrast = params.contrast,
        threshold = params.threshold,
        path = %path.display(),
        "Adjustment saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_map() {
        let fields =
            parse_field_map(r#"{"medicare_number": "1234567890", "postcode": 2026, "sex": null}"#).unwrap();

        assert_eq!(fields["medicare_number"], "1234567890");
        assert_eq!(fields["postcode"], "2026");
        assert_eq!(fields["sex"], "");
    }

    #[test]
    fn test_null_checked_field_is_reported() {
        let fields = parse_field_map(r#"{"provider_number": null, "medicare_number": "1234567890"}"#).unwrap();
        let result = validate_data(&fields);

        assert!(!result.is_valid());
        assert_eq!(result.iter().count(), 1);
        assert_eq!(result.iter().next().map(|(field, _)| field), Some("provider_number"));
    }

    #[test]
    fn test_save_adjustment_writes_all_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let params = AdjustmentParameters { brightness: 62, contrast: 41, threshold: 150 };

        save_adjustment(&ScannerConfig::default(), &path, params).unwrap();

        let saved = ScannerConfig::from_file(&path).unwrap();
        assert_eq!(saved.adjustment(), params);
    }

    #[test]
    fn test_parse_field_map_rejects_array() {
        assert!(parse_field_map("[1, 2]").is_err());
    }

    #[test]
    fn test_cli_parses_process() {
        let cli = Cli::try_parse_from(["form-scanner", "-v", "process", "scans", "-o", "out.csv"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process { folder, out } => {
                assert_eq!(folder, PathBuf::from("scans"));
                assert_eq!(out, Some(PathBuf::from("out.csv")));
            }
            _ => panic!("expected process"),
        }
    }
}
