//! Resolved run configuration
//!
//! [`RunConfig`] is the validated form of the command line that the pipeline works
//! from: input paths are expanded, defaults filled in and the dispatch mode decided.

use crate::cli::Args;
use crate::dispatch::DispatchMode;
use crate::errors::{MosaicError, Result};
use crate::layout::OutputLayout;
use crate::negotiation::{ExtentPolicy, ResolutionPolicy, SrsPolicy};
use crate::parallel::ParallelConfig;
use crate::postprocess::PostTools;
use crate::statistics::Stat;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_PBS_SCRIPT: &str = "dem_mosaic_parallel.pbs";

/// Everything a run needs, with defaults applied
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: Vec<PathBuf>,
    pub srs_policy: SrsPolicy,
    pub res_policy: ResolutionPolicy,
    pub extent_policy: ExtentPolicy,
    pub tile_size: f64,
    pub stats: Vec<Stat>,
    pub parallel: ParallelConfig,
    pub layout: OutputLayout,
    /// Never `Auto` once resolved
    pub mode: DispatchMode,
    pub dem_mosaic: PathBuf,
    pub post_tools: PostTools,
    pub pbs_script: PathBuf,
    pub lustre_stripe: Option<u32>,
    pub dry_run: bool,
    pub skip_dispatch: bool,
}

impl RunConfig {
    /// Validate and resolve parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive tile size or an unreadable input list file.
    pub fn from_args(args: Args) -> Result<Self> {
        if !(args.georef_tile_size.is_finite() && args.georef_tile_size > 0.0) {
            return Err(MosaicError::InvalidTileSize(args.georef_tile_size));
        }

        let inputs = expand_inputs(&args.inputs)?;
        let stats = dedup_stats(&args.stat);
        info!(
            "The following mosaics will be generated: {}",
            stats.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
        );

        let parallel = args
            .threads
            .map_or_else(ParallelConfig::physical_cores, ParallelConfig::new);
        let mode = args.mode.resolve(&args.cluster_domain);
        let pbs_script = args.pbs_script.unwrap_or_else(default_pbs_script);

        Ok(Self {
            inputs,
            srs_policy: args.t_srs,
            res_policy: args.tr,
            extent_policy: args.t_projwin,
            tile_size: args.georef_tile_size,
            stats,
            parallel,
            layout: OutputLayout::new(&args.output),
            mode,
            dem_mosaic: args.dem_mosaic,
            post_tools: PostTools {
                gdalbuildvrt: args.gdalbuildvrt,
                index_ts: args.index_ts_cmd,
            },
            pbs_script,
            lustre_stripe: args.lustre_stripe,
            dry_run: args.dry_run,
            skip_dispatch: args.skip_dispatch,
        })
    }
}

/// Requested statistics in order without repeats; `wmean` when none were given
#[must_use]
pub fn dedup_stats(requested: &[Stat]) -> Vec<Stat> {
    let mut stats: Vec<Stat> = Vec::with_capacity(requested.len());
    for &s in requested {
        if !stats.contains(&s) {
            stats.push(s);
        }
    }
    if stats.is_empty() {
        stats.push(Stat::Wmean);
    }
    stats
}

/// A single `.txt` argument is a file with one input path per line.
///
/// # Errors
///
/// Returns an error if the list file cannot be read.
pub fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    if let [single] = inputs {
        let path = Path::new(single);
        if path.extension().is_some_and(|e| e == "txt") {
            info!("Reading filenames from input text file {}", path.display());
            let listing = fs::read_to_string(path)?;
            return Ok(listing
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(PathBuf::from)
                .collect());
        }
    }
    Ok(inputs.iter().map(PathBuf::from).collect())
}

fn default_pbs_script() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_PBS_SCRIPT)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PBS_SCRIPT))
}
