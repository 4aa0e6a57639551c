//! Keeps a local copy of a zipped reference dataset (the GSHHG shapefiles) in step with its
//! HTTP source, using the advertised `Content-Length` as the freshness signal.
use crate::download_plan::{local_size, needs_download};
use anyhow::{anyhow, Context, Result};
use reqwest::header::CONTENT_LENGTH;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use zip::read::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    Updated { entries: usize },
    UpToDate,
}

/// Local path the archive at `url` is stored under.
pub fn archive_path(url: &str, dir: &Path) -> Result<PathBuf> {
    let parsed = Url::parse(url)?;
    let file_name = parsed
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .ok_or(anyhow!("No file name in archive url: {}", url))?;
    Ok(dir.join(file_name))
}

/// Size the server advertises for `url`. Any failure counts as unknown.
///
/// Tries `HEAD` first. Hosts that refuse it get a `GET` whose body is dropped unread once the
/// headers are in.
pub async fn remote_size(client: &reqwest::Client, url: &str) -> Option<u64> {
    match probe(client.head(url)).await {
        Some(size) => Some(size),
        None => {
            debug!("HEAD {url} gave no size, asking with GET");
            probe(client.get(url)).await
        }
    }
}

async fn probe(request: reqwest::RequestBuilder) -> Option<u64> {
    let response = match request.send().await {
        Ok(r) if r.status().is_success() => r,
        Ok(r) => {
            debug!("{} returned {}", r.url(), r.status());
            return None;
        }
        Err(e) => {
            debug!("Size probe failed: {e}");
            return None;
        }
    };
    response
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

pub async fn sync_archive(client: &reqwest::Client, url: &str, dir: &Path) -> Result<ArchiveStatus> {
    let path = archive_path(url, dir)?;
    let remote = remote_size(client, url).await;
    let local = local_size(&path)?;

    if !needs_download(local, remote) {
        info!("Shapefiles up to date");
        return Ok(ArchiveStatus::UpToDate);
    }

    info!("Going to download {url}");
    fs::create_dir_all(dir)?;
    download(client, url, &path)
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    info!("Shapefiles downloaded, unzipping...");
    let entries =
        extract(&path, dir).with_context(|| format!("Failed to unzip {}", path.display()))?;
    info!("Shapefiles unzip completed");

    Ok(ArchiveStatus::Updated { entries })
}

async fn download(client: &reqwest::Client, url: &str, path: &Path) -> Result<u64> {
    let mut response = client.get(url).send().await?.error_for_status()?;
    let mut file = File::create(path)?;
    let mut byte_count = 0_u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)?;
        byte_count += chunk.len() as u64;
    }
    file.flush()?;
    debug!("Stored {byte_count} bytes to {}", path.display());
    Ok(byte_count)
}

/// Unpack every entry of `archive` below `dir`, overwriting files already there.
pub fn extract(archive: &Path, dir: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(File::open(archive)?)?;
    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    Ok(written)
}
