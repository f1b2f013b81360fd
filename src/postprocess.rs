//! Assembly of per-tile outputs
//!
//! For each statistic: optionally convert index maps to timestamps, build a VRT
//! over the tiles that were actually produced, and archive the `dem_mosaic` logs.

use crate::dispatch::{order_by_workload, run_quiet};
use crate::errors::Result;
use crate::index::TileIndex;
use crate::layout::OutputLayout;
use crate::parallel::ParallelConfig;
use crate::statistics::Stat;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// External programs used after dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct PostTools {
    pub gdalbuildvrt: PathBuf,
    pub index_ts: PathBuf,
}

/// What happened for one statistic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatReport {
    pub tiles_found: usize,
    pub tiles_missing: usize,
    pub vrt: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub logs_archived: usize,
}

/// Tile outputs of `stat` that exist on disk
#[must_use]
pub fn collect_tile_outputs(index: &TileIndex, layout: &OutputLayout, stat: Stat) -> Vec<PathBuf> {
    order_by_workload(index)
        .into_iter()
        .map(|r| layout.tile_output(r.tile, stat))
        .filter(|p| p.exists())
        .collect()
}

/// Convert index maps to timestamp rasters where that has not happened yet and
/// return the timestamp file names.
///
/// # Errors
///
/// Returns an error only if the worker pool cannot be created.
pub fn convert_index_maps(
    outputs: &[PathBuf],
    converter: &Path,
    config: &ParallelConfig,
) -> Result<Vec<PathBuf>> {
    let todo: Vec<&PathBuf> = outputs
        .iter()
        .filter(|p| !OutputLayout::timestamp_output(p).exists())
        .collect();

    if !todo.is_empty() {
        let pool = config.build_pool("index map conversion")?;
        let failed = pool.install(|| {
            todo.par_iter()
                .filter(|p| !run_quiet(converter, &[p.to_string_lossy().into_owned()]))
                .count()
        });
        if failed > 0 {
            warn!("{} index map conversions failed", failed);
        }
    }

    Ok(outputs
        .iter()
        .map(|p| OutputLayout::timestamp_output(p))
        .collect())
}

/// Build a VRT over the existing files among `tiles`; missing ones are reported and
/// left out. Returns `None` when nothing exists.
pub fn build_vrt(gdalbuildvrt: &Path, vrt: &Path, tiles: &[PathBuf]) -> Option<PathBuf> {
    info!("Creating vrt of valid tiles: {}", vrt.display());
    let mut present: Vec<&PathBuf> = Vec::with_capacity(tiles.len());
    for tile in tiles {
        if tile.exists() {
            present.push(tile);
        } else {
            warn!("Missing file: {}", tile.display());
        }
    }
    if present.is_empty() {
        warn!("No tile outputs, skipping {}", vrt.display());
        return None;
    }
    present.sort();

    let mut args = vec![
        "-r".to_string(),
        "cubic".to_string(),
        vrt.to_string_lossy().into_owned(),
    ];
    args.extend(present.iter().map(|p| p.to_string_lossy().into_owned()));
    run_quiet(gdalbuildvrt, &args).then(|| vrt.to_path_buf())
}

/// `dem_mosaic` log files of `stat` in the output directory, sorted
///
/// # Errors
///
/// Returns an error if the output directory cannot be listed.
pub fn find_log_files(layout: &OutputLayout, stat: Stat) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(layout.dir())? {
        let entry = entry?;
        let name = entry.file_name();
        if name
            .to_str()
            .is_some_and(|n| layout.is_log_file(n, stat))
            && entry.file_type()?.is_file()
        {
            logs.push(entry.path());
        }
    }
    logs.sort();
    Ok(logs)
}

/// Pack `logs` into a gzipped tarball, then delete them.
///
/// # Errors
///
/// Returns an error if the archive cannot be written; the logs are only removed
/// after the archive is complete.
pub fn archive_logs(logs: &[PathBuf], archive: &Path) -> Result<()> {
    info!("Cleaning up {} dem_mosaic log files", logs.len());
    let file = fs::File::create(archive)?;
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for log in logs {
        let name = log.file_name().map_or_else(|| log.as_os_str(), |n| n);
        tar.append_path_with_name(log, name)?;
    }
    tar.into_inner()?.finish()?;

    for log in logs {
        fs::remove_file(log)?;
    }
    Ok(())
}

/// Post-process one statistic: conversion, VRT, log archive.
///
/// # Errors
///
/// Returns an error for pool creation, directory listing or archive failures.
pub fn finish_stat(
    index: &TileIndex,
    layout: &OutputLayout,
    stat: Stat,
    tools: &PostTools,
    config: &ParallelConfig,
) -> Result<StatReport> {
    info!("Mosaic type: {}", stat);
    let mut outputs = collect_tile_outputs(index, layout, stat);
    let mut report = StatReport {
        tiles_found: outputs.len(),
        tiles_missing: index.len() - outputs.len(),
        ..StatReport::default()
    };
    if report.tiles_missing > 0 {
        warn!(
            "{} of {} tiles have no {} output",
            report.tiles_missing,
            index.len(),
            stat
        );
    }

    if stat.is_index() && !outputs.is_empty() {
        outputs = convert_index_maps(&outputs, &tools.index_ts, config)?;
    }

    report.vrt = build_vrt(&tools.gdalbuildvrt, &layout.vrt(stat), &outputs);

    let logs = find_log_files(layout, stat)?;
    if logs.is_empty() {
        info!("No dem_mosaic log files to archive");
    } else {
        let archive = layout.log_archive(stat);
        archive_logs(&logs, &archive)?;
        report.logs_archived = logs.len();
        report.archive = Some(archive);
    }
    Ok(report)
}
