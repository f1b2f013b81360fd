//! Entry point for mosaic_tiler.
//! Handles CLI parsing and logging setup, then hands over to the pipeline.

use clap::Parser;
use env_logger::Env;
use log::info;
use mosaic_tiler::cli::Args;
use mosaic_tiler::config::RunConfig;
use mosaic_tiler::pipeline;

#[cfg(feature = "gdal")]
fn reader() -> mosaic_tiler::GdalReader {
    mosaic_tiler::GdalReader::new()
}

#[cfg(not(feature = "gdal"))]
fn reader() -> mosaic_tiler::GeoTiffReader {
    mosaic_tiler::GeoTiffReader::new()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let config = RunConfig::from_args(args)?;
    let summary = pipeline::run(&config, &reader())?;

    for (stat, report) in &summary.reports {
        info!(
            "{}: {} tiles, {} missing, vrt {}",
            stat,
            report.tiles_found,
            report.tiles_missing,
            report
                .vrt
                .as_ref()
                .map_or_else(|| "not written".to_string(), |p| p.display().to_string())
        );
    }
    Ok(())
}
