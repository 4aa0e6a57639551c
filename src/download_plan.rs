use crate::s3::S3ObjOps;
use anyhow::{Context, Result};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub bucket: String,
    pub key: String,
    pub output: PathBuf,
}

impl DownloadTask {
    pub fn new(bucket: &str, key: &str, output: PathBuf) -> Self {
        DownloadTask {
            bucket: bucket.to_string(),
            key: key.to_string(),
            output,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64 },
    Skipped,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
}

impl DownloadPlan {
    pub fn new(tasks: Vec<DownloadTask>) -> Self {
        Self { tasks }
    }

    pub fn extend(self: &mut Self, other: DownloadPlan) {
        self.tasks.extend(other.tasks);
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub async fn execute(self: &Self, provider: &impl S3ObjOps) -> Result<Vec<FetchOutcome>> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.iter() {
            debug!(?task, "Current task");
            let outcome = try_download(provider, &task.bucket, &task.key, &task.output)
                .await
                .with_context(|| format!("Failed to fetch s3://{}/{}", task.bucket, task.key))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

/// Byte length of a local file, `None` when it does not exist.
pub fn local_size(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A transfer is needed unless both sizes are known and equal.
pub fn needs_download(local: Option<u64>, remote: Option<u64>) -> bool {
    match (local, remote) {
        (Some(local), Some(remote)) => local != remote,
        _ => true,
    }
}

/// Download `key` to `output` unless a local copy with the remote byte length is already there.
pub async fn try_download(
    provider: &impl S3ObjOps,
    bucket: &str,
    key: &str,
    output: &Path,
) -> Result<FetchOutcome> {
    let local = local_size(output)?;

    let head_object = provider.head_object(bucket, key).await?;
    let remote = head_object
        .content_length()
        .and_then(|len| u64::try_from(len).ok());

    if !needs_download(local, remote) {
        info!("File {key} size matches local copy, skipping...");
        return Ok(FetchOutcome::Skipped);
    }

    // Make parent directories as necessary
    if let Some(parent_dir) = output.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }

    let mut response = provider.get_object(bucket, key).await?;

    let mut partial = output.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let byte_count = match write_body(&mut response, &partial).await {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    // Rename the file to remove .partial suffix
    fs::rename(&partial, output)?;
    info!("Blob {key} downloaded to {}", output.display());

    Ok(FetchOutcome::Downloaded { bytes: byte_count })
}

async fn write_body(response: &mut GetObjectOutput, path: &Path) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut byte_count = 0_u64;
    while let Some(bytes) = response.body.try_next().await? {
        file.write_all(&bytes)?;
        byte_count += bytes.len() as u64;
    }
    file.flush()?;
    Ok(byte_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::mock::MockStore;
    use tempfile::TempDir;

    const KEY: &str = "VIIRS-I1-SDR/2024/02/20/SVI01_j01_d20240220_t1705308_e1706553_b32345_c20240220174017188614_oeac_ops.h5";

    fn mock_download_plan(dir: &Path) -> DownloadPlan {
        DownloadPlan {
            tasks: (1..=3)
                .map(|i| {
                    DownloadTask::new(
                        "mybucket",
                        &format!("path/to/file{i}.txt"),
                        dir.join(format!("file{i}.txt")),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_needs_download() {
        assert!(!needs_download(Some(10), Some(10)));
        assert!(needs_download(Some(10), Some(11)));
        assert!(needs_download(None, Some(10)));
        assert!(needs_download(Some(10), None));
        assert!(needs_download(None, None));
    }

    #[test]
    fn test_write_and_read_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("download_plan.json");
        mock_download_plan(dir.path()).write(&path).unwrap();

        let plan = DownloadPlan::read(&path).unwrap();
        assert_eq!(plan.tasks.len(), 3);
        assert_eq!(plan.tasks[1].key, "path/to/file2.txt");
    }

    #[tokio::test]
    async fn test_downloads_when_local_file_absent() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default().with_object(KEY, b"sdr payload");
        let output = dir.path().join("samples").join("SVI01.h5");

        let outcome = try_download(&store, "bucket", KEY, &output).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 11 });
        assert_eq!(store.get_count(), 1);
        assert_eq!(fs::read(&output).unwrap(), b"sdr payload");
        assert!(!dir.path().join("samples").join("SVI01.h5.partial").exists());
    }

    #[tokio::test]
    async fn test_skips_when_sizes_match() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default().with_object(KEY, b"sdr payload");
        let output = dir.path().join("SVI01.h5");
        // Same length, different content: size is the only freshness signal.
        fs::write(&output, b"xxxxxxxxxxx").unwrap();

        let outcome = try_download(&store, "bucket", KEY, &output).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Skipped);
        assert_eq!(store.get_count(), 0);
        assert_eq!(fs::read(&output).unwrap(), b"xxxxxxxxxxx");
    }

    #[tokio::test]
    async fn test_redownloads_when_sizes_differ() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default().with_object(KEY, b"sdr payload");
        let output = dir.path().join("SVI01.h5");
        fs::write(&output, b"stale").unwrap();

        let outcome = try_download(&store, "bucket", KEY, &output).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 11 });
        assert_eq!(store.get_count(), 1);
        assert_eq!(fs::read(&output).unwrap(), b"sdr payload");
    }

    #[tokio::test]
    async fn test_unknown_remote_length_forces_download() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default()
            .with_object(KEY, b"sdr payload")
            .without_lengths();
        let output = dir.path().join("SVI01.h5");
        fs::write(&output, b"sdr payload").unwrap();

        let outcome = try_download(&store, "bucket", KEY, &output).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 11 });
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_get_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default()
            .with_object(KEY, b"sdr payload")
            .failing_gets();
        let output = dir.path().join("SVI01.h5");
        fs::write(&output, b"stale").unwrap();

        assert!(try_download(&store, "bucket", KEY, &output).await.is_err());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("SVI01.h5")]);
        assert_eq!(fs::read(&output).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_missing_remote_object_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default();
        let output = dir.path().join("SVI01.h5");

        assert!(try_download(&store, "bucket", KEY, &output).await.is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_execute_reports_each_task() {
        let dir = TempDir::new().unwrap();
        let store = MockStore::default()
            .with_object("path/to/file1.txt", b"one")
            .with_object("path/to/file2.txt", b"two")
            .with_object("path/to/file3.txt", b"three");
        let plan = mock_download_plan(dir.path());
        fs::write(dir.path().join("file2.txt"), b"TWO").unwrap();

        let outcomes = plan.execute(&store).await.unwrap();

        assert_eq!(
            outcomes,
            vec![
                FetchOutcome::Downloaded { bytes: 3 },
                FetchOutcome::Skipped,
                FetchOutcome::Downloaded { bytes: 5 },
            ]
        );
        assert_eq!(store.head_count(), 3);
        assert_eq!(store.get_count(), 2);
    }
}
