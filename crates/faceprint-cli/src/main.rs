use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceprint_core::{
    FaceAnalysis, FaceAnalyzer, FaceDetector, FaceRecognizer, DEFAULT_MATCH_THRESHOLD,
    DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const MODEL_NAME: &str = "insightface_arcface";
const INTRA_THREADS: usize = 2;
/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "faceprint", about = "faceprint face embedding CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the model bundle loads
    Check {
        /// Directory holding det_10g.onnx and w600k_r50.onnx
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Print the embedding of the largest face in an image
    Embed {
        /// JPEG or PNG image
        image: PathBuf,
        #[arg(long)]
        model_dir: Option<PathBuf>,
        /// Identifier echoed in the output
        #[arg(long, default_value_t = 0)]
        student_id: i64,
    },
    /// Compare two embeddings stored as JSON arrays
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directives(
            std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        )))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { model_dir } => {
            let passed = check(&model_dir.unwrap_or_else(faceprint_core::default_model_dir));
            return if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE };
        }
        Commands::Embed {
            image,
            model_dir,
            student_id,
        } => embed(
            &image,
            &model_dir.unwrap_or_else(faceprint_core::default_model_dir),
            student_id,
        ),
        Commands::Compare { a, b, threshold } => compare(&a, &b, threshold),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn model_path(dir: &Path, file: &str) -> String {
    dir.join(file).to_string_lossy().into_owned()
}

/// Step-by-step model smoke test. Prints remediation hints instead of a bare error.
fn check(model_dir: &Path) -> bool {
    println!("1. Model directory: {}", model_dir.display());
    if !model_dir.is_dir() {
        println!("   FAILED: directory does not exist");
        println!("   Fix: download the insightface buffalo_l bundle and unpack it there,");
        println!("        or pass --model-dir");
        return false;
    }

    println!("2. Loading SCRFD detector ({DETECTOR_MODEL_FILE})...");
    if let Err(e) = FaceDetector::load(&model_path(model_dir, DETECTOR_MODEL_FILE), INTRA_THREADS) {
        println!("   FAILED: {e}");
        println!("   Fix: re-download the bundle; the file may be missing or corrupted");
        return false;
    }
    println!("   ok");

    println!("3. Loading ArcFace recognizer ({RECOGNIZER_MODEL_FILE})...");
    if let Err(e) = FaceRecognizer::load(&model_path(model_dir, RECOGNIZER_MODEL_FILE), INTRA_THREADS) {
        println!("   FAILED: {e}");
        println!("   Fix: check that ONNX Runtime is installed and the model file is intact");
        return false;
    }
    println!("   ok");

    println!("All checks passed; faceprintd can be started.");
    true
}

fn embed(image: &Path, model_dir: &Path, student_id: i64) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let rgb = faceprint_core::decode_rgb(&bytes)?;

    let detector = FaceDetector::load(&model_path(model_dir, DETECTOR_MODEL_FILE), INTRA_THREADS)?;
    let recognizer = FaceRecognizer::load(&model_path(model_dir, RECOGNIZER_MODEL_FILE), INTRA_THREADS)?;
    let mut analysis = FaceAnalysis::new(MODEL_NAME, detector, recognizer);

    let faces = analysis.analyze(&rgb)?;
    if faces.is_empty() {
        bail!("no face detected in {}", image.display());
    }
    let face = faceprint_core::largest_face(&faces)?;
    let Some(embedding) = &face.embedding else {
        bail!("largest face has no embedding");
    };
    tracing::info!(faces = faces.len(), area = face.bbox.area(), "largest face selected");

    let out = serde_json::json!({
        "student_id": student_id,
        "embedding": embedding.values,
        "dim": embedding.dim(),
        "model": analysis.model_name(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// `RUST_LOG` when it is set and non-empty, `info` otherwise.
fn log_directives(rust_log: Option<String>) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn read_embedding(path: &Path) -> Result<Vec<f32>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)?;

    // Accept a bare array or the object printed by `embed`
    let array = value.get("embedding").unwrap_or(&value);
    serde_json::from_value(array.clone())
        .with_context(|| format!("{} is not a JSON array of numbers", path.display()))
}

fn compare(a: &Path, b: &Path, threshold: f64) -> Result<()> {
    let comparison = faceprint_core::compare(&read_embedding(a)?, &read_embedding(b)?, threshold)?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}
