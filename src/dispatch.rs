//! Dispatch of `dem_mosaic` jobs
//!
//! One job is created per (tile, statistic). Jobs run either locally on a bounded
//! worker pool or, on a cluster, are written to a command file and handed to the
//! PBS scheduler.
//!
//! A failing job is not an error. Its output file simply does not appear, and
//! post-processing reports it as missing.

use crate::errors::Result;
use crate::index::{TileIndex, TileRecord};
use crate::layout::OutputLayout;
use crate::negotiation::MosaicParams;
use crate::parallel::ParallelConfig;
use crate::statistics::Stat;
use clap::ValueEnum;
use log::{debug, info, warn};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tiles with more inputs than this get extra `dem_mosaic` threads
pub const LARGE_TILE_INPUTS: usize = 80;
pub const LARGE_TILE_THREADS: u32 = 4;

/// Where jobs are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatchMode {
    /// Batch on hosts matching the cluster domain, local otherwise
    Auto,
    Local,
    /// Write a command file and submit it with qsub
    Batch,
}

impl DispatchMode {
    /// Resolve `Auto` against the host name.
    #[must_use]
    pub fn resolve(self, cluster_domain: &str) -> Self {
        match self {
            Self::Auto if on_cluster(cluster_domain) => Self::Batch,
            Self::Auto => Self::Local,
            other => other,
        }
    }
}

/// Does this host's name contain `domain`?
#[must_use]
pub fn on_cluster(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    host_name().is_some_and(|h| h.contains(domain))
}

fn host_name() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
}

/// One `dem_mosaic` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub tile: u32,
    pub stat: Stat,
    pub output: PathBuf,
    pub args: Vec<String>,
}

impl Job {
    /// The job as one shell command line
    #[must_use]
    pub fn command_line(&self, program: &Path) -> String {
        std::iter::once(program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|a| shell_quote(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Arguments for `dem_mosaic` computing `stat` over one tile
#[must_use]
pub fn dem_mosaic_args(
    record: &TileRecord,
    params: &MosaicParams,
    stat: Stat,
    output: &Path,
    input_list: &Path,
) -> Vec<String> {
    let threads = if record.inputs.len() > LARGE_TILE_INPUTS {
        LARGE_TILE_THREADS
    } else {
        1
    };
    let e = &record.extent;

    let mut args = vec![
        "-o".to_string(),
        output.to_string_lossy().into_owned(),
        "--threads".to_string(),
        threads.to_string(),
        "--tr".to_string(),
        params.resolution.to_string(),
        "--t_srs".to_string(),
        params.srs.definition.clone(),
        "--t_projwin".to_string(),
        e.xmin.to_string(),
        e.ymin.to_string(),
        e.xmax.to_string(),
        e.ymax.to_string(),
        "--force-projwin".to_string(),
    ];
    args.extend(stat.dem_mosaic_flags());
    args.push("-l".to_string());
    args.push(input_list.to_string_lossy().into_owned());
    args
}

/// Tiles with the most inputs first, since they take longest
#[must_use]
pub fn order_by_workload(index: &TileIndex) -> Vec<&TileRecord> {
    let mut records: Vec<&TileRecord> = index.records().collect();
    records.sort_by(|a, b| b.inputs.len().cmp(&a.inputs.len()).then(a.tile.cmp(&b.tile)));
    records
}

/// Write the per-tile input lists and create a job for every output that does not
/// exist yet.
///
/// # Errors
///
/// Returns an error if an input list cannot be written.
pub fn plan_jobs(index: &TileIndex, layout: &OutputLayout, stats: &[Stat]) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let mut existing = 0usize;

    for record in order_by_workload(index) {
        let list_path = layout.tile_input_list(record.tile);
        let listing = record
            .inputs
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&list_path, listing)?;

        for &stat in stats {
            let output = layout.tile_output(record.tile, stat);
            if output.exists() {
                existing += 1;
                continue;
            }
            let args = dem_mosaic_args(record, &index.params, stat, &output, &list_path);
            jobs.push(Job {
                tile: record.tile,
                stat,
                output,
                args,
            });
        }
    }

    info!(
        "{} dem_mosaic jobs to run ({} outputs already exist)",
        jobs.len(),
        existing
    );
    Ok(jobs)
}

/// Outcome of a local dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run a program on the pool, discarding its output. Returns whether it succeeded.
pub(crate) fn run_quiet(program: &Path, args: &[String]) -> bool {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(s) if s.success() => true,
        Ok(s) => {
            warn!("{} exited with {}", program.display(), s);
            false
        }
        Err(e) => {
            warn!("Failed to launch {}: {}", program.display(), e);
            false
        }
    }
}

/// Run all jobs locally with at most `config.num_threads` simultaneous processes.
///
/// Jobs start in the given order.
///
/// # Errors
///
/// Returns an error only if the worker pool cannot be created.
pub fn run_local(jobs: &[Job], program: &Path, config: &ParallelConfig) -> Result<DispatchSummary> {
    if jobs.is_empty() {
        return Ok(DispatchSummary::default());
    }
    let pool = config.build_pool("dem_mosaic")?;
    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.scope_fifo(|scope| {
        for job in jobs {
            let (succeeded, failed) = (&succeeded, &failed);
            scope.spawn_fifo(move |_| {
                debug!("tile {} {}: {}", job.tile, job.stat, job.command_line(program));
                if run_quiet(program, &job.args) {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                } else {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    let summary = DispatchSummary {
        succeeded: succeeded.into_inner(),
        failed: failed.into_inner(),
    };
    info!(
        "dem_mosaic finished: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(summary)
}

/// Write the jobs as a shell command file, one command per line.
///
/// An existing command file is left untouched. Returns whether a file was written.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_command_file(jobs: &[Job], program: &Path, path: &Path) -> Result<bool> {
    if path.exists() {
        info!("Command file {} already exists, not rewriting", path.display());
        return Ok(false);
    }
    info!("Creating text file of commands: {}", path.display());
    let mut out = BufWriter::new(fs::File::create(path)?);
    for job in jobs {
        writeln!(out, "{}", job.command_line(program))?;
    }
    out.flush()?;
    Ok(true)
}

/// Submit the command file to PBS via `qsub -v cmd_fn=<file> <script>`.
///
/// Returns whether `qsub` accepted the job.
pub fn submit_command_file(command_file: &Path, pbs_script: &Path) -> bool {
    let args = vec![
        "-v".to_string(),
        format!("cmd_fn={}", command_file.display()),
        pbs_script.to_string_lossy().into_owned(),
    ];
    info!("qsub {}", args.join(" "));
    let status = Command::new("qsub").args(&args).status();
    match status {
        Ok(s) if s.success() => true,
        Ok(s) => {
            warn!("qsub exited with {}", s);
            false
        }
        Err(e) => {
            warn!("Failed to launch qsub: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("EPSG:32610"), "EPSG:32610");
        assert_eq!(shell_quote("+proj=utm +zone=10"), "'+proj=utm +zone=10'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_explicit_modes_are_not_resolved() {
        assert_eq!(DispatchMode::Local.resolve("anything"), DispatchMode::Local);
        assert_eq!(DispatchMode::Batch.resolve(""), DispatchMode::Batch);
        assert_eq!(DispatchMode::Auto.resolve(""), DispatchMode::Local);
    }
}
