//! Local OSRM dataset preparation (Geofabrik download + Docker preprocessing).
//!
//! Each travel profile gets its own graph directory because `osrm-extract`
//! bakes the Lua profile into the output files.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::info;

use crate::types::TravelProfile;

pub const OSRM_IMAGE: &str = "osrm/osrm-backend";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeofabrikRegion {
    /// Geofabrik region path, e.g. "asia/south-korea".
    pub path: String,
}

impl GeofabrikRegion {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// South Korea is the smallest Geofabrik extract covering Busan.
    pub fn south_korea() -> Self {
        Self::new("asia/south-korea")
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("region")
    }

    pub fn url(&self) -> String {
        format!("https://download.geofabrik.de/{}-latest.osm.pbf", self.path)
    }
}

#[derive(Debug, Clone)]
pub struct OsrmDatasetConfig {
    pub region: GeofabrikRegion,
    pub profile: TravelProfile,
    pub data_root: PathBuf,
}

impl OsrmDatasetConfig {
    pub fn new(region: GeofabrikRegion, profile: TravelProfile, data_root: impl Into<PathBuf>) -> Self {
        Self {
            region,
            profile,
            data_root: data_root.into(),
        }
    }
}

/// A preprocessed MLD graph ready for `osrm-routed`.
#[derive(Debug, Clone)]
pub struct OsrmDataset {
    /// Directory to mount at `/data` in the routing container.
    pub data_dir: PathBuf,
    pub osrm_base: PathBuf,
    pub pbf_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum OsrmDataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    ProcessFailure(String),
}

impl OsrmDataset {
    /// Downloads and preprocesses whatever is missing under
    /// `<data_root>/<region>/<profile>/`.
    pub fn ensure(config: &OsrmDatasetConfig) -> Result<Self, OsrmDataError> {
        let region_name = config.region.name();
        let data_root = if config.data_root.is_absolute() {
            config.data_root.clone()
        } else {
            std::env::current_dir()?.join(&config.data_root)
        };
        let region_dir = data_root.join(region_name);
        let data_dir = region_dir.join(config.profile.osrm_profile());
        fs::create_dir_all(&data_dir)?;

        let pbf_name = format!("{region_name}-latest.osm.pbf");
        let shared_pbf = region_dir.join(&pbf_name);
        if !shared_pbf.exists() {
            info!(url = %config.region.url(), "downloading OSM extract");
            download_pbf(&config.region.url(), &shared_pbf)?;
        }
        let pbf_path = data_dir.join(&pbf_name);
        if !pbf_path.exists() {
            fs::hard_link(&shared_pbf, &pbf_path).or_else(|_| fs::copy(&shared_pbf, &pbf_path).map(|_| ()))?;
        }

        let osrm_base = data_dir.join(format!("{region_name}-latest.osrm"));
        if !osrm_base.exists() {
            info!(profile = %config.profile, "running osrm-extract");
            run_docker(
                &[
                    "osrm-extract",
                    "-p",
                    config.profile.osrm_lua(),
                    &format!("/data/{}", file_name(&pbf_path)),
                ],
                &data_dir,
            )?;
        }

        if !mld_ready(&osrm_base) {
            info!(profile = %config.profile, "running osrm-partition and osrm-customize");
            let graph = format!("/data/{}", file_name(&osrm_base));
            run_docker(&["osrm-partition", &graph], &data_dir)?;
            run_docker(&["osrm-customize", &graph], &data_dir)?;
        }

        Ok(Self {
            data_dir,
            osrm_base,
            pbf_path,
        })
    }

    /// Graph path as seen from inside the routing container.
    pub fn container_graph_path(&self) -> String {
        format!("/data/{}", file_name(&self.osrm_base))
    }
}

fn download_pbf(url: &str, dest: &Path) -> Result<(), OsrmDataError> {
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let tmp_path = dest.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp_path)?);
    let bytes = response.bytes()?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    fs::rename(tmp_path, dest)?;
    Ok(())
}

fn mld_ready(osrm_base: &Path) -> bool {
    osrm_base.exists()
        && ["osrm.partition", "osrm.mldgr", "osrm.cells"]
            .iter()
            .all(|ext| osrm_base.with_extension(ext).exists())
}

fn run_docker(args: &[&str], data_dir: &Path) -> Result<(), OsrmDataError> {
    let status = Command::new("docker")
        .arg("run")
        .arg("--rm")
        .arg("-t")
        .arg("-v")
        .arg(format!("{}:/data", data_dir.display()))
        .arg(OSRM_IMAGE)
        .args(args)
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(OsrmDataError::ProcessFailure(format!(
            "`{}` exited with {status}",
            args.first().copied().unwrap_or("docker")
        )))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string()
}
