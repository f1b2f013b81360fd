//! File naming for everything a run writes
//!
//! All outputs hang off one prefix, e.g. `mos/mos`:
//!
//! ```text
//! mos/mos_tile_index.json                   persisted tile index
//! mos/mos-tile-007_fn_list.txt              inputs of tile 7
//! mos/mos-tile-007-wmean.tif                dem_mosaic output
//! mos/mos-tile-007-lastindex_ts.tif         index map converted to timestamps
//! mos/mos_wmean.vrt                         virtual mosaic per statistic
//! mos/mos_wmean_dem_mosaic_log.tar.gz       archived dem_mosaic logs
//! mos/mos_cmd.sh                            command batch for the cluster
//! ```

use crate::errors::Result;
use crate::statistics::Stat;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const DEFAULT_PREFIX: &str = "mos/mos";

/// Output directory and file-name prefix of a run
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    dir: PathBuf,
    prefix: PathBuf,
    /// Zero-padding width for tile numbers
    tile_digits: usize,
}

impl OutputLayout {
    /// Interpret an `-o` argument.
    ///
    /// A bare name without directory part is used for both directory and prefix, so
    /// `foo` becomes `foo/foo`.
    #[must_use]
    pub fn new(output: &str) -> Self {
        let given = Path::new(output);
        let (dir, prefix) = match given.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                (parent.to_path_buf(), given.to_path_buf())
            }
            _ => (given.to_path_buf(), given.join(given)),
        };
        Self {
            dir,
            prefix,
            tile_digits: 1,
        }
    }

    /// Create the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Set the Lustre stripe count of the output directory, ignoring failures
    pub fn set_stripe(&self, count: u32) {
        let status = Command::new("lfs")
            .arg("setstripe")
            .arg("-c")
            .arg(count.to_string())
            .arg(&self.dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => debug!("lfs setstripe -c {} {}", count, self.dir.display()),
            Ok(s) => warn!("lfs setstripe exited with {}", s),
            Err(e) => warn!("lfs setstripe unavailable: {}", e),
        }
    }

    /// Pad tile numbers to the width of the largest one
    #[must_use]
    pub fn with_tile_digits_for(mut self, max_tile: u32) -> Self {
        self.tile_digits = max_tile.to_string().len();
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s = self.prefix.clone().into_os_string();
        s.push(suffix);
        PathBuf::from(s)
    }

    #[must_use]
    pub fn tile_index(&self) -> PathBuf {
        self.with_suffix("_tile_index.json")
    }

    #[must_use]
    pub fn command_file(&self) -> PathBuf {
        self.with_suffix("_cmd.sh")
    }

    fn tile_base(&self, tile: u32) -> String {
        format!("-tile-{:0width$}", tile, width = self.tile_digits)
    }

    #[must_use]
    pub fn tile_input_list(&self, tile: u32) -> PathBuf {
        self.with_suffix(&format!("{}_fn_list.txt", self.tile_base(tile)))
    }

    #[must_use]
    pub fn tile_output(&self, tile: u32, stat: Stat) -> PathBuf {
        self.with_suffix(&format!("{}-{}.tif", self.tile_base(tile), stat))
    }

    /// Timestamp raster derived from an index-map tile output
    #[must_use]
    pub fn timestamp_output(tile_output: &Path) -> PathBuf {
        let mut s = tile_output.with_extension("").into_os_string();
        s.push("_ts.tif");
        PathBuf::from(s)
    }

    #[must_use]
    pub fn vrt(&self, stat: Stat) -> PathBuf {
        if stat.is_index() {
            self.with_suffix(&format!("_{stat}_ts.vrt"))
        } else {
            self.with_suffix(&format!("_{stat}.vrt"))
        }
    }

    #[must_use]
    pub fn log_archive(&self, stat: Stat) -> PathBuf {
        self.with_suffix(&format!("_{stat}_dem_mosaic_log.tar.gz"))
    }

    /// Does `file_name` look like a `dem_mosaic` log for this prefix and statistic,
    /// i.e. `<prefix>*-<stat>.tif-log-dem_mosaic-*.txt`?
    ///
    /// The leading dash keeps `mean` from claiming `wmean` logs.
    #[must_use]
    pub fn is_log_file(&self, file_name: &str, stat: Stat) -> bool {
        let Some(stem) = self.prefix.file_name().and_then(|s| s.to_str()) else {
            return false;
        };
        let marker = format!("-{stat}.tif-log-dem_mosaic-");
        file_name.starts_with(stem)
            && file_name.ends_with(".txt")
            && file_name[stem.len()..]
                .find(&marker)
                .is_some_and(|pos| !file_name[stem.len() + pos + marker.len()..].is_empty())
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
