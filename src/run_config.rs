use crate::catalog::{MalformedKeyPolicy, TimeWindow};
use crate::error::ConfigError;
use crate::s3::DEFAULT_REGION;
use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Product prefixes fetched in order, e.g. imagery then geolocation.
    pub products: Vec<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub samples_dir: PathBuf,
    pub shapefiles_dir: PathBuf,
    pub shapefiles_url: String,
    pub output_file: PathBuf,
    /// Where a dry run records its plan; kept out of `samples_dir`, which polar2grid reads.
    #[serde(default = "default_plan_file")]
    pub plan_file: PathBuf,
    #[serde(default)]
    pub malformed_keys: MalformedKeyPolicy,
    pub render: RenderConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub executable: String,
    pub reader: String,
    pub writer: String,
    pub product: String,
    pub verbosity: u8,
    #[serde(default)]
    pub coastlines: bool,
    pub coastlines_executable: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_plan_file() -> PathBuf {
    PathBuf::from("./download_plan.json")
}

pub fn run_config_toml() -> toml::Table {
    toml::toml! {
        bucket = "noaa-nesdis-n20-pds"

        region = "us-east-1"

        // I-band imagery first, then its terrain-corrected geolocation
        products = ["VIIRS-I1-SDR", "VIIRS-IMG-GEO-TC"]

        date = "2024-02-20"
        start_time = "17:05:00"
        end_time = "17:10:00"

        samples_dir = "./jpss_samples"
        shapefiles_dir = "./shapefiles"
        shapefiles_url = "https://www.soest.hawaii.edu/pwessel/gshhg/gshhg-shp-2.3.7.zip"
        output_file = "result.tif"
        plan_file = "./download_plan.json"

        malformed_keys = "abort"

        [render]
        executable = "polar2grid.sh"
        reader = "viirs_sdr"
        writer = "geotiff"
        product = "i01"
        verbosity = 3
        coastlines = false
        coastlines_executable = "add_coastlines.sh"
    }
}

impl RunConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Like `write`, but leaves an existing file alone unless `force` is set.
    pub fn write_new<P: AsRef<Path>>(self: &Self, path: P, force: bool) -> Result<()> {
        let path = path.as_ref();
        if !force && path.exists() {
            return Err(ConfigError::AlreadyExists(path.display().to_string()).into());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write(path)
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        Ok(config)
    }

    pub fn validate(self: &Self) -> Result<(), ConfigError> {
        if self.end_time <= self.start_time {
            return Err(ConfigError::EmptyWindow {
                start: self.start_time.to_string(),
                end: self.end_time.to_string(),
            });
        }
        if self.products.is_empty() {
            return Err(ConfigError::NoProducts);
        }
        Ok(())
    }

    pub fn window(self: &Self) -> TimeWindow {
        TimeWindow::new(
            self.date.and_time(self.start_time),
            self.date.and_time(self.end_time),
        )
    }

    /// Listing prefix for one product on the configured day.
    pub fn prefix(self: &Self, product: &str) -> String {
        format!("{}/{}/", product, self.date.format("%Y/%m/%d"))
    }
}
