//! parkscenes CLI - batch driver and debug tool for scene detection
//!
//! Usage:
//!   parkscenes-cli cluster <photos.json> [--park <unit>] [--output <file>] [--config <file>]
//!   parkscenes-cli import <photos.json> --db <path>
//!   parkscenes-cli refresh --db <path> [--park <unit>] [--config <file>]
//!   parkscenes-cli retag --db <path> --park <unit> [--config <file>]
//!
//! `photos.json` is an array of photo objects
//! (`id`, `park_unit`, `latitude`, `longitude`, `tags`, `upload_timestamp`).
//! The database commands need the `persistence` feature.

use clap::{Parser, Subcommand};
use parkscenes::{ClusterConfig, MemoryStore, ParkRun, PhotoPoint, PhotoSource, Result, pipeline};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "parkscenes-cli")]
#[command(about = "Scene detection for geotagged park photos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster photos from a JSON file and print the scenes
    Cluster {
        /// JSON file with an array of photos
        input: PathBuf,

        /// Only process this park unit
        #[arg(short, long)]
        park: Option<String>,

        /// Write the full results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file overriding the default clustering configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load photos from a JSON file into an SQLite database
    #[cfg(feature = "persistence")]
    Import {
        /// JSON file with an array of photos
        input: PathBuf,

        /// SQLite database path (created if missing)
        #[arg(long)]
        db: PathBuf,
    },

    /// Recluster parks stored in an SQLite database and persist the scenes
    #[cfg(feature = "persistence")]
    Refresh {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Only refresh this park unit
        #[arg(short, long)]
        park: Option<String>,

        /// JSON file overriding the default clustering configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Recompute tag rankings of a park without reclustering
    #[cfg(feature = "persistence")]
    Retag {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        #[arg(short, long)]
        park: String,

        /// JSON file overriding the default clustering configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let result = match cli.command {
        Commands::Cluster {
            input,
            park,
            output,
            config,
        } => run_cluster(&input, park.as_deref(), output.as_deref(), config.as_deref()),
        #[cfg(feature = "persistence")]
        Commands::Import { input, db } => run_import(&input, &db),
        #[cfg(feature = "persistence")]
        Commands::Refresh { db, park, config } => {
            run_refresh(&db, park.as_deref(), config.as_deref())
        }
        #[cfg(feature = "persistence")]
        Commands::Retag { db, park, config } => run_retag(&db, &park, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_photos(path: &Path) -> Result<Vec<PhotoPoint>> {
    let reader = BufReader::new(File::open(path)?);
    let photos: Vec<PhotoPoint> = serde_json::from_reader(reader)?;
    println!("Loaded {} photos from {}", photos.len(), path.display());
    Ok(photos)
}

fn load_config(path: Option<&Path>) -> Result<ClusterConfig> {
    match path {
        Some(p) => Ok(serde_json::from_str(&fs::read_to_string(p)?)?),
        None => Ok(ClusterConfig::default()),
    }
}

fn print_run(run: &ParkRun) {
    println!("\n{}", "-".repeat(60));
    println!("PARK {}", run.park_unit);
    println!("{}", "-".repeat(60));
    match (run.parameters.radius_eps, run.parameters.min_samples) {
        (Some(eps), Some(min_samples)) => println!(
            "  eps: {:.6}  min_samples: {}  clusters: {}  noise: {}",
            eps,
            min_samples,
            run.parameters.cluster_count,
            run.noise_count()
        ),
        _ => println!("  no clusters ({} photos)", run.photos.len()),
    }

    for scene in &run.scenes {
        println!(
            "  #{:<3} label {:<4} {:>5} photos  ({:.5}, {:.5})",
            scene.popularity_rank.unwrap_or(0),
            scene.cluster_label,
            scene.photo_count,
            scene.centroid_latitude,
            scene.centroid_longitude
        );
        if !scene.top_tags.is_empty() {
            println!("        tags: {}", scene.top_tags_joined());
        }
    }
}

fn run_cluster(
    input: &Path,
    park: Option<&str>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let store = MemoryStore::from_photos(load_photos(input)?)?;

    let parks: Vec<String> = match park {
        Some(p) => vec![p.to_string()],
        None => store.park_units()?,
    };

    println!("\n{}", "=".repeat(60));
    println!("SCENE DETECTION ({} parks)", parks.len());
    println!("{}", "=".repeat(60));

    let mut runs = Vec::with_capacity(parks.len());
    for park_unit in &parks {
        match pipeline::process_park(park_unit, store.photos_for_park(park_unit)?, None, &config) {
            Ok(run) => {
                print_run(&run);
                runs.push(run);
            }
            Err(e) => eprintln!("  [ERR] {}: {}", park_unit, e),
        }
    }

    if let Some(path) = output {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &runs)?;
        println!("\nWrote {} park results to {}", runs.len(), path.display());
    }
    Ok(())
}

#[cfg(feature = "persistence")]
fn run_import(input: &Path, db: &Path) -> Result<()> {
    use std::collections::BTreeSet;

    let store = parkscenes::SqliteStore::open(db)?;
    let photos = load_photos(input)?;
    let inserted = store.insert_photos(&photos)?;
    let parks: BTreeSet<&str> = photos.iter().map(|p| p.park_unit.as_str()).collect();
    println!(
        "Imported {} photos across {} parks into {}",
        inserted,
        parks.len(),
        db.display()
    );
    Ok(())
}

#[cfg(feature = "persistence")]
fn run_refresh(db: &Path, park: Option<&str>, config: Option<&Path>) -> Result<()> {
    use parkscenes::AtomicProgressTracker;
    use std::sync::atomic::Ordering;

    let config = load_config(config)?;
    let store = parkscenes::SqliteStore::open(db)?;
    let parks: Vec<String> = match park {
        Some(p) => vec![p.to_string()],
        None => store.park_units()?,
    };

    let progress = AtomicProgressTracker::new();
    let report = pipeline::run_batch(&store, &store, &parks, &config, &progress);

    println!("\n{}", "-".repeat(60));
    println!(
        "RESULTS: {}/{} parks refreshed",
        progress.completed.load(Ordering::SeqCst),
        progress.total.load(Ordering::SeqCst)
    );
    println!("{}", "-".repeat(60));
    for (park_unit, scenes) in &report.succeeded {
        println!("  {:<8} {} scenes", park_unit, scenes);
    }
    for (park_unit, e) in &report.failed {
        eprintln!("  [ERR] {:<8} {}", park_unit, e);
    }
    if !report.is_success() {
        std::process::exit(2);
    }
    Ok(())
}

#[cfg(feature = "persistence")]
fn run_retag(db: &Path, park: &str, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let store = parkscenes::SqliteStore::open(db)?;
    let run = pipeline::retag_park(&store, &store, park, &config)?;
    print_run(&run);
    Ok(())
}
