use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that plays sky scripts against recording collaborators",
    version
)]
pub struct Args {
    /// Script to play
    pub script: PathBuf,

    /// Frame rate driving the player tick
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Initial playback multiplier (power of two, at most 8)
    #[arg(long, default_value_t = 1)]
    pub speed: u32,

    /// Record every dispatched command to a new script
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Listen address for remote command lines (e.g. 127.0.0.1:7101)
    #[arg(long)]
    pub listen: Option<String>,

    /// Path to write the collaborator trace and player status as JSON
    #[arg(long)]
    pub trace_json: Option<PathBuf>,

    /// Root directory for script name resolution
    #[arg(long, default_value = "scripts")]
    pub scripts_root: PathBuf,

    /// Root directory for media name resolution
    #[arg(long, default_value = "media")]
    pub media_root: PathBuf,

    /// Stop after this many simulated seconds even if still playing
    #[arg(long)]
    pub max_seconds: Option<f64>,

    /// Log at debug level
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            bail!("--fps must be a positive number");
        }
        if self.speed == 0 || !self.speed.is_power_of_two() || self.speed > 8 {
            bail!("--speed must be 1, 2, 4, or 8");
        }
        if let Some(max) = self.max_seconds {
            if !max.is_finite() || max <= 0.0 {
                bail!("--max-seconds must be a positive number");
            }
        }
        Ok(())
    }
}

pub fn parse() -> Result<Args> {
    let args = Args::parse();
    args.validate()?;
    Ok(args)
}
