//! Synthetic Triangulation Demo
//!
//! Builds a seeded synthetic scene, optionally perturbs the image points with
//! Gaussian noise, triangulates every point and reports the 3D and
//! reprojection errors against ground truth.
//!
//! Usage:
//! ```bash
//! cargo run --example triangulate_synthetic -- \
//!   --views 5 --points 50 --noise 0.5 \
//!   --config samples/triangulator.yaml \
//!   --output-csv output/points.csv
//! ```

use clap::Parser;
use log::info;
use sfm_triangulation::geometry;
use sfm_triangulation::reprojection;
use sfm_triangulation::synthetic::{self, NViewDataSetConfig};
use sfm_triangulation::{export, Triangulator, TriangulatorConfig};
use std::path::PathBuf;
use std::time::Instant;

/// Triangulate a synthetic multi-view scene
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of cameras on the circle around the scene
    #[arg(short = 'v', long, default_value = "5")]
    views: usize,

    /// Number of ground-truth points
    #[arg(short = 'n', long, default_value = "50")]
    points: usize,

    /// Use the fixed two-camera scene instead of the camera circle
    #[arg(long)]
    two_view: bool,

    /// Standard deviation of the image noise in pixels
    #[arg(long, default_value = "0.0")]
    noise: f64,

    /// Seed for scene generation and noise
    #[arg(short = 's', long, default_value = "42")]
    seed: u64,

    /// Triangulator configuration YAML
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Write triangulated points to this CSV file
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Write the full batch report to this JSON file
    #[arg(long)]
    output_json: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let path = path.to_str().ok_or("Invalid config path string")?;
            info!("Loading triangulator config from: {path}");
            TriangulatorConfig::load_from_yaml(path)?
        }
        None => TriangulatorConfig::default(),
    };

    let mut data = if cli.two_view {
        synthetic::two_realistic_cameras()?
    } else {
        let scene = NViewDataSetConfig {
            seed: cli.seed,
            ..NViewDataSetConfig::default()
        };
        synthetic::n_realistic_cameras(cli.views, cli.points, &scene)?
    };
    if cli.noise > 0.0 {
        data.add_gaussian_noise(cli.noise, cli.seed)?;
    }

    println!("Synthetic triangulation");
    println!("=======================");
    println!("Views: {}", data.num_views());
    println!("Points: {}", data.num_points());
    println!("Noise sigma: {} px", cli.noise);
    println!("Backend: {:?}\n", config.backend);

    let triangulator = Triangulator::new(config)?;
    let batch = data.batch()?;

    let start = Instant::now();
    let report = triangulator.triangulate_batch(&batch);
    let elapsed = start.elapsed();

    let summary = report.summary();
    println!(
        "Triangulated {}/{} points in {:?} ({} failed, {} flagged)",
        summary.succeeded, summary.total, elapsed, summary.failed, summary.flagged
    );

    let max_3d_error = report
        .points()
        .map(|(i, p)| geometry::distance_l_infinity(p, &data.points[i]))
        .fold(0.0, f64::max);
    println!("Max 3D error (L-inf): {max_3d_error:e}");

    match reprojection::batch_stats(&report, &batch) {
        Ok(stats) => println!("{stats:?}"),
        Err(e) => println!("No reprojection statistics: {e}"),
    }

    if let Some(path) = &cli.output_csv {
        export::write_points_csv(&report, path)?;
        println!("Points written to {}", path.display());
    }
    if let Some(path) = &cli.output_json {
        export::write_report_json(&report, path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
