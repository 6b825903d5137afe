use clap::error::ErrorKind;
use clap::Parser;
use reg_align::{RegistrationConfig, RegistrationError, RegistrationResult};
use reg_cli::{
    failure_message, roi_from_args, run, tune_detector, DetectorTuning, Invocation, Preset, MATCH_VISUALIZATION_FILE,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "image-registration",
    version,
    about = "Align an image onto a reference image using ORB features and a homography"
)]
struct Cli {
    /// Image to register
    moving: PathBuf,
    /// Reference image
    reference: PathBuf,
    /// Crop the image to register to a rectangle
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"])]
    moving_crop: Option<Vec<u32>>,
    /// Crop the reference image to a rectangle
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"])]
    reference_crop: Option<Vec<u32>>,
    /// Registration settings (.json or .toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Start the detector from a named preset
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// FAST intensity threshold
    #[arg(long)]
    threshold: Option<u8>,
    /// Maximum features kept per image
    #[arg(long)]
    max_features: Option<usize>,
    /// Worker threads (0 uses every core)
    #[arg(long)]
    threads: Option<usize>,
    /// Minimum distance between corners kept on one pyramid level
    #[arg(long)]
    nms_distance: Option<f32>,
    /// Skip subpixel refinement of corners
    #[arg(long)]
    no_subpixel: bool,
    /// Where to write the match visualization
    #[arg(long, value_name = "FILE", default_value = MATCH_VISUALIZATION_FILE)]
    visualization: PathBuf,
    /// Display all operations
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn tuning(&self) -> DetectorTuning {
        DetectorTuning {
            preset: self.preset,
            threshold: self.threshold,
            max_features: self.max_features,
            threads: self.threads,
            nms_distance: self.nms_distance,
            no_subpixel: self.no_subpixel,
        }
    }

    fn invocation(&self) -> RegistrationResult<Invocation> {
        let mut config = match &self.config {
            Some(path) => {
                RegistrationConfig::load(path).map_err(|e| RegistrationError::InvalidConfig(e.to_string()))?
            }
            None => RegistrationConfig::default(),
        };
        config.detector = tune_detector(config.detector, &self.tuning())?;

        let mut invocation = Invocation::new(&self.moving, &self.reference);
        invocation.moving_crop = self.moving_crop.as_deref().map(roi_from_args).transpose()?;
        invocation.reference_crop = self.reference_crop.as_deref().map(roi_from_args).transpose()?;
        invocation.config = config;
        invocation.visualization_path = self.visualization.clone();
        Ok(invocation)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            println!("{}", failure_message(&RegistrationError::InvalidArguments(e.to_string())));
            return ExitCode::FAILURE;
        }
    };

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let result = cli.invocation().and_then(|invocation| {
        if let Err(e) = reg_core::init_thread_pool(invocation.config.detector.core.n_threads) {
            warn!(error = %e, "could not configure the thread pool, using the default one");
        }
        let t0 = Instant::now();
        let outcome = run(&invocation);
        debug!(elapsed = ?t0.elapsed(), "registration finished");
        outcome
    });

    match result {
        Ok(outcome) => {
            println!("Saved matching keypoints in '{}'.", outcome.visualization_path.display());
            println!("The registered image was saved at: '{}'.", outcome.aligned_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", failure_message(&e));
            ExitCode::FAILURE
        }
    }
}
