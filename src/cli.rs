//! Defines command-line interface options using `clap` for mosaic_tiler.

use crate::dispatch::DispatchMode;
use crate::layout::DEFAULT_PREFIX;
use crate::negotiation::{ExtentPolicy, ResolutionPolicy, SrsPolicy};
use crate::statistics::Stat;
use clap::Parser;
use std::path::PathBuf;

/// Run dem_mosaic in parallel for valid tiles only
#[derive(Parser, Debug)]
#[command(
    name = "mosaic_tiler",
    version,
    about = "Wrapper for dem_mosaic that will only write valid tiles"
)]
pub struct Args {
    /// Input filenames (img1.tif img2.tif ...), or a single .txt file listing them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Output resolution: first|last|min|max|mean|median, a number, or a raster path
    #[arg(long, default_value = "min", value_parser = ResolutionPolicy::parse)]
    pub tr: ResolutionPolicy,

    /// Output extent: union|intersection|first|last, 'xmin ymin xmax ymax', or a raster path
    #[arg(
        long = "t-projwin",
        alias = "t_projwin",
        default_value = "union",
        allow_hyphen_values = true,
        value_parser = ExtentPolicy::parse
    )]
    pub t_projwin: ExtentPolicy,

    /// Output projection: first|last, a raster path, or an SRS definition (e.g. EPSG:32610)
    #[arg(long = "t-srs", alias = "t_srs", default_value = "first", value_parser = SrsPolicy::parse)]
    pub t_srs: SrsPolicy,

    /// Output tile width in projected units (meters), tiles are square
    #[arg(long = "georef-tile-size", alias = "georef_tile_size", default_value_t = 100_000.0)]
    pub georef_tile_size: f64,

    /// Number of simultaneous dem_mosaic processes. Defaults to the number of physical cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Output statistics to pass to dem_mosaic (default: wmean)
    #[arg(long, value_enum, num_args = 1..)]
    pub stat: Vec<Stat>,

    /// Output mosaic prefix
    #[arg(short = 'o', long = "output", default_value = DEFAULT_PREFIX)]
    pub output: String,

    /// Where to run dem_mosaic: locally, or as a PBS batch on the cluster
    #[arg(long, value_enum, default_value_t = DispatchMode::Auto)]
    pub mode: DispatchMode,

    /// Host name fragment identifying the cluster for --mode auto
    #[arg(long, default_value = "nasa")]
    pub cluster_domain: String,

    /// PBS script submitted with qsub (default: dem_mosaic_parallel.pbs next to this executable)
    #[arg(long)]
    pub pbs_script: Option<PathBuf>,

    /// dem_mosaic executable
    #[arg(long, env = "DEM_MOSAIC", default_value = "dem_mosaic")]
    pub dem_mosaic: PathBuf,

    /// gdalbuildvrt executable
    #[arg(long, env = "GDALBUILDVRT", default_value = "gdalbuildvrt")]
    pub gdalbuildvrt: PathBuf,

    /// Converter from dem_mosaic index maps to timestamp rasters
    #[arg(long, env = "DEM_MOSAIC_INDEX_TS", default_value = "dem_mosaic_index_ts.py")]
    pub index_ts_cmd: PathBuf,

    /// Lustre stripe count for the output directory
    #[arg(long)]
    pub lustre_stripe: Option<u32>,

    /// Build (or load) the tile index and print it without running dem_mosaic
    #[arg(long, conflicts_with = "skip_dispatch")]
    pub dry_run: bool,

    /// Do not run dem_mosaic, only assemble existing tile outputs
    #[arg(long)]
    pub skip_dispatch: bool,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
