//! Command-line runner for the POSSUMS classroom observation simulator.
//!
//! Loads a simulation configuration, generates student behaviour
//! sequences, samples them at every configured interval, and writes the
//! resulting report. The report only reaches its destination if the whole
//! simulation succeeds.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the first argument or `possums-config.yaml`
//! 2. Initialize structured logging (tracing), `RUST_LOG` overriding the
//!    configured level
//! 3. Validate the configuration into an event catalogue and parameters
//! 4. Seed the random number generator from `world.seed`
//! 5. Run the single or repeated simulation
//! 6. Write the report atomically to `output.path`
//! 7. Log the result

mod error;

use std::path::{Path, PathBuf};

use possums_core::config::SimulationConfig;
use possums_core::runner;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "possums-config.yaml";

/// Application entry point for the simulator.
///
/// # Errors
///
/// Returns an error if configuration, the simulation, or writing the
/// report fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, loaded_from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("possums-engine starting");
    if loaded_from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    // 3. Validate.
    let validated = config.validate().map_err(EngineError::from)?;
    info!(
        events = validated.catalog().len(),
        students = validated.students(),
        total_observation_time = validated.total_observation_time(),
        intervals = ?validated.intervals(),
        repeat_count = ?validated.repeat_count(),
        strategy = ?validated.strategy(),
        "Configuration validated"
    );
    for (id, event) in validated.catalog().iter() {
        info!(state = %id, event = %event, "Event registered");
    }

    // 4. Seed the generator.
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    info!(seed = config.world.seed, "Random generator seeded");

    // 5. Run.
    let output = runner::run(&validated, &mut rng).map_err(EngineError::from)?;

    // 6. Write the report.
    write_report(Path::new(&config.output.path), &output.report)?;
    info!(path = config.output.path, "Report written");

    // 7. Log the result.
    runner::log_simulation_end(&output);

    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
///
/// The second element of the result tells whether the file was read.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}

/// Write `report` to `path` through a sibling temporary file and a rename,
/// so a partial report never replaces an existing one.
fn write_report(path: &Path, report: &str) -> Result<(), EngineError> {
    let output_error = |source| EngineError::Output {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(output_error)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, report)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|source| {
            // Cleanup is best effort; the write or rename error is reported.
            let _ = std::fs::remove_file(&tmp);
            output_error(source)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("possums-engine-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = scratch_dir("missing");
        let (config, loaded) = load_config(&dir.join("absent.yaml")).unwrap();
        assert!(!loaded);
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn config_file_is_read() {
        let dir = scratch_dir("config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sim.yaml");
        std::fs::write(&path, "world:\n  seed: 9\n").unwrap();
        let (config, loaded) = load_config(&path).unwrap();
        assert!(loaded);
        assert_eq!(config.world.seed, 9);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = scratch_dir("rename");
        let path = dir.join("report.csv");
        // A non-empty directory at the destination makes the rename fail.
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let result = write_report(&path, "a,b\r\n");
        assert!(matches!(result, Err(EngineError::Output { .. })));
        assert!(!dir.join("report.csv.tmp").exists());
        assert!(path.join("keep").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn report_is_written_without_leftover_temp_file() {
        let dir = scratch_dir("report");
        let path = dir.join("nested").join("report.csv");
        write_report(&path, "a,b\r\n").unwrap();
        write_report(&path, "c,d\r\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "c,d\r\n");
        assert!(!dir.join("nested").join("report.csv.tmp").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
