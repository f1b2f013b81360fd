//! End-to-end run: index, dispatch, post-processing

use crate::config::RunConfig;
use crate::data_source::{read_inputs, RasterReader};
use crate::dispatch::{
    plan_jobs, run_local, submit_command_file, write_command_file, DispatchMode, DispatchSummary,
};
use crate::errors::Result;
use crate::extent::SNAP_TOLERANCE;
use crate::grid::{aligned_tile_size, TileGrid};
use crate::index::{build_tile_index, print_index, TileIndex};
use crate::negotiation::negotiate;
use crate::parallel::get_parallel_info;
use crate::postprocess::{finish_stat, StatReport};
use crate::statistics::Stat;
use log::{debug, info, warn};
use std::time::Instant;

/// How a run went
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// The tile index came from a previous run
    pub index_reused: bool,
    pub valid_tiles: usize,
    pub dispatch: Option<DispatchSummary>,
    /// Jobs were handed to the cluster scheduler; post-processing did not run
    pub submitted: bool,
    pub reports: Vec<(Stat, StatReport)>,
}

/// Would `requested` give a different grid than the `stored` (already aligned) size?
fn tile_size_differs(stored: f64, requested: f64, resolution: f64) -> bool {
    (aligned_tile_size(requested, resolution) - stored).abs() > resolution * SNAP_TOLERANCE
}

/// Read the inputs and compute the tile index from scratch.
///
/// # Errors
///
/// Propagates reader, negotiation and indexing errors.
pub fn compute_tile_index(config: &RunConfig, reader: &dyn RasterReader) -> Result<TileIndex> {
    info!("Note: this could take several minutes depending on number of inputs and I/O performance");
    let inputs = read_inputs(reader, &config.inputs)?;
    let negotiated = negotiate(
        &inputs,
        reader,
        &config.srs_policy,
        &config.res_policy,
        &config.extent_policy,
    )?;
    let grid = TileGrid::new(&negotiated.params, config.tile_size)?;
    build_tile_index(&grid, &negotiated.footprints, &negotiated.params)
}

/// Run the whole workflow described by `config`.
///
/// # Errors
///
/// Returns an error if the index cannot be built or loaded, or if files the tool
/// writes itself (input lists, command file, VRT inputs, log archives) cannot be
/// written. Failing `dem_mosaic` invocations are not errors.
pub fn run(config: &RunConfig, reader: &dyn RasterReader) -> Result<RunSummary> {
    let started = Instant::now();
    let pinfo = get_parallel_info();
    debug!(
        "{} cores available ({} physical)",
        pinfo.available_cores, pinfo.physical_cores
    );

    config.layout.create_dir()?;
    if let Some(count) = config.lustre_stripe {
        config.layout.set_stripe(count);
    }

    let index_path = config.layout.tile_index();
    let (index, index_reused) =
        TileIndex::load_or_build(&index_path, || compute_tile_index(config, reader))?;
    if index_reused && tile_size_differs(index.tile_size, config.tile_size, index.params.resolution) {
        warn!(
            "Reusing {} built with tile size {}, ignoring requested {}",
            index_path.display(),
            index.tile_size,
            config.tile_size
        );
    }
    info!(
        "Mosaic parameters: tr={} t_srs={} t_projwin=[{}]",
        index.params.resolution, index.params.srs, index.params.extent
    );

    let mut summary = RunSummary {
        index_reused,
        valid_tiles: index.len(),
        ..RunSummary::default()
    };

    if config.dry_run {
        print_index(&index);
        return Ok(summary);
    }

    let max_tile = index.tiles.keys().next_back().copied().unwrap_or(0);
    let layout = config.layout.clone().with_tile_digits_for(max_tile);

    if config.skip_dispatch {
        info!("Skipping dem_mosaic dispatch");
    } else {
        let jobs = plan_jobs(&index, &layout, &config.stats)?;
        match config.mode {
            DispatchMode::Batch => {
                let command_file = layout.command_file();
                write_command_file(&jobs, &config.dem_mosaic, &command_file)?;
                summary.submitted = submit_command_file(&command_file, &config.pbs_script);
                info!("Re-run with --skip-dispatch once the cluster job has finished");
                return Ok(summary);
            }
            DispatchMode::Local | DispatchMode::Auto => {
                summary.dispatch = Some(run_local(&jobs, &config.dem_mosaic, &config.parallel)?);
            }
        }
    }

    for &stat in &config.stats {
        let report = finish_stat(&index, &layout, stat, &config.post_tools, &config.parallel)?;
        summary.reports.push((stat, report));
    }

    info!("Done in {:.1}s", started.elapsed().as_secs_f64());
    Ok(summary)
}
