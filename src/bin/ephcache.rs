//! Build, query and inspect persisted ephemeris caches.
//!
//! `RUST_LOG` controls diagnostics on stderr (default `warn`).

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ephemeris_cache::cache::{CacheBuilder, Capabilities, EphemerisCache, MethodDowngrade};
use ephemeris_cache::config::load_cache_config;
use ephemeris_cache::export::{self, grid_csv};
use ephemeris_cache::primitives::time::mjd_to_mjd2000;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Sampled ephemeris cache builder and query tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample the ephemeris described by a manifest and persist the cache
    Build {
        /// Cache manifest (YAML or TOML)
        #[arg(long)]
        config: PathBuf,

        /// Output cache document (use '-' for stdout)
        #[arg(long, default_value = "artifacts/eph.json")]
        output: PathBuf,

        /// Override the manifest grid resolution
        #[arg(long)]
        samples: Option<usize>,

        /// Override the manifest interpolation method (linear or spline)
        #[arg(long)]
        method: Option<String>,

        /// Build as if no spline backend were available
        #[arg(long, default_value_t = false)]
        linear_only: bool,
    },
    /// Interpolate states from a persisted cache
    Query {
        /// Cache document written by `build` (use '-' for stdin)
        #[arg(long)]
        input: PathBuf,

        /// Epoch to query; repeat for several
        #[arg(long = "epoch", required = true, allow_negative_numbers = true)]
        epochs: Vec<f64>,

        /// Epochs are Modified Julian Dates; the cache is in MJD2000
        #[arg(long, default_value_t = false)]
        mjd: bool,
    },
    /// Summarize a persisted cache
    Inspect {
        #[arg(long)]
        input: PathBuf,
    },
    /// Export the stored sample grid as CSV
    Grid {
        #[arg(long)]
        input: PathBuf,

        /// Output CSV file (use '-' for stdout)
        #[arg(long, default_value = "-")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build {
            config,
            output,
            samples,
            method,
            linear_only,
        } => build(&config, &output, samples, method, linear_only),
        Command::Query { input, epochs, mjd } => query(&input, &epochs, mjd),
        Command::Inspect { input } => inspect(&input),
        Command::Grid { input, output } => grid(&input, &output),
    }
}

fn build(
    config_path: &Path,
    output: &Path,
    samples: Option<usize>,
    method: Option<String>,
    linear_only: bool,
) -> anyhow::Result<()> {
    let config = load_cache_config(config_path)?;
    let source = config.source.to_source()?;
    let capabilities = if linear_only {
        Capabilities::linear_only()
    } else {
        Capabilities::detect()
    };

    let built = CacheBuilder::new(config.start, config.end)
        .samples(samples.unwrap_or(config.samples))
        .method(method.unwrap_or(config.method))
        .capabilities(capabilities)
        .build(&source)?;
    report_downgrade(built.downgrade.as_ref());

    export::dump(&built.cache, output)?;
    if output != Path::new("-") {
        println!(
            "[written] {} ({} grid points, {} interpolation)",
            output.display(),
            built.cache.grid().len(),
            built.cache.method()
        );
    }
    Ok(())
}

fn query(input: &Path, epochs: &[f64], mjd: bool) -> anyhow::Result<()> {
    let cache = load(input)?;
    let mut failed = 0usize;
    for &requested in epochs {
        let epoch = if mjd { mjd_to_mjd2000(requested) } else { requested };
        match cache.eph(epoch) {
            Ok(state) => {
                let [x, y, z] = state.position;
                let [vx, vy, vz] = state.velocity;
                println!("{epoch} {x} {y} {z} {vx} {vy} {vz}");
            }
            Err(err) => {
                eprintln!("[warn] {err}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} epochs were outside the cached range",
            epochs.len()
        );
    }
    Ok(())
}

fn inspect(input: &Path) -> anyhow::Result<()> {
    let cache = load(input)?;
    let step = (cache.end() - cache.start()) / cache.samples() as f64;
    println!("range   : [{}, {}]", cache.start(), cache.end());
    println!(
        "samples : {} ({} grid points, step {step})",
        cache.samples(),
        cache.grid().len()
    );
    println!("method  : {}", cache.method());
    match cache.spline_coefficients() {
        Some(components) => println!("splines : {} components", components.len()),
        None => println!("splines : none"),
    }
    Ok(())
}

fn grid(input: &Path, output: &Path) -> anyhow::Result<()> {
    let cache = load(input)?;
    grid_csv::write_grid(export::writer_for_path(output)?, cache.grid())?;
    Ok(())
}

fn load(input: &Path) -> anyhow::Result<EphemerisCache> {
    let built = export::load(input, Capabilities::detect())?;
    report_downgrade(built.downgrade.as_ref());
    Ok(built.cache)
}

fn report_downgrade(downgrade: Option<&MethodDowngrade>) {
    if let Some(reason) = downgrade {
        eprintln!("[warn] {reason}");
    }
}
