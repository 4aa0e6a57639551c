//! Hands the downloaded granules to polar2grid, which turns them into a raster product.
use crate::error::RenderError;
use crate::run_config::RenderConfig;
use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub trait Renderer {
    async fn render(self: &Self, input_dir: &Path) -> Result<()>;
}

pub struct Polar2Grid {
    config: RenderConfig,
    output_file: PathBuf,
    shapefiles_dir: PathBuf,
}

impl Polar2Grid {
    pub fn new(config: RenderConfig, output_file: PathBuf, shapefiles_dir: PathBuf) -> Self {
        Self {
            config,
            output_file,
            shapefiles_dir,
        }
    }

    pub fn render_args(self: &Self, input_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-r".into(),
            self.config.reader.clone().into(),
            "-w".into(),
            self.config.writer.clone().into(),
            "--output-filename".into(),
            self.output_file.clone().into(),
        ];
        if self.config.verbosity > 0 {
            args.push(format!("-{}", "v".repeat(self.config.verbosity as usize)).into());
        }
        args.extend([
            "-p".into(),
            self.config.product.clone().into(),
            "-f".into(),
            input_dir.as_os_str().to_owned(),
        ]);
        args
    }

    pub fn coastline_args(self: &Self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--shapes-dir".into(),
            self.shapefiles_dir.clone().into(),
        ];
        args.extend(
            [
                "--add-coastlines",
                "--add-grid",
                "--grid-D",
                "10.0",
                "10.0",
                "--grid-d",
                "10.0",
                "10.0",
                "--grid-text-size",
                "20",
            ]
            .map(OsString::from),
        );
        args.push(self.output_file.clone().into());
        args
    }
}

impl Renderer for Polar2Grid {
    async fn render(self: &Self, input_dir: &Path) -> Result<()> {
        info!(
            "Rendering {} from {}",
            self.output_file.display(),
            input_dir.display()
        );
        run_tool(&self.config.executable, &self.render_args(input_dir)).await?;

        if self.config.coastlines {
            info!("Adding coastlines to {}", self.output_file.display());
            run_tool(&self.config.coastlines_executable, &self.coastline_args()).await?;
        }
        Ok(())
    }
}

async fn run_tool(program: &str, args: &[OsString]) -> Result<(), RenderError> {
    debug!(program, ?args, "Spawning");
    let output = Command::new(program)
        .args(args)
        .env("USE_POLAR2GRID_DEFAULTS", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| RenderError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(RenderError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_config::{run_config_toml, RunConfig};

    fn polar2grid(executable: &str) -> Polar2Grid {
        let config = RunConfig::from_template(&run_config_toml()).unwrap();
        let mut render = config.render;
        render.executable = executable.to_string();
        Polar2Grid::new(render, config.output_file, config.shapefiles_dir)
    }

    #[test]
    fn test_render_args() {
        let args = polar2grid("polar2grid.sh").render_args(Path::new("./jpss_samples"));
        let expected: Vec<OsString> = [
            "-r",
            "viirs_sdr",
            "-w",
            "geotiff",
            "--output-filename",
            "result.tif",
            "-vvv",
            "-p",
            "i01",
            "-f",
            "./jpss_samples",
        ]
        .map(OsString::from)
        .to_vec();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_coastline_args() {
        let args = polar2grid("polar2grid.sh").coastline_args();
        assert_eq!(args[0], OsString::from("--shapes-dir"));
        assert_eq!(args[1], OsString::from("./shapefiles"));
        assert_eq!(args.last().unwrap(), &OsString::from("result.tif"));
        assert_eq!(args.len(), 13);
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let err = polar2grid("definitely-not-installed-p2g")
            .render(Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_propagated() {
        let err = polar2grid("false").render(Path::new(".")).await.unwrap_err();
        match err.downcast_ref::<RenderError>() {
            Some(RenderError::Failed { status, .. }) => assert_eq!(status.code(), Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run() {
        assert!(polar2grid("true").render(Path::new(".")).await.is_ok());
    }
}
