//! Artifact publishing.
//!
//! Two sinks are provided:
//!
//! - [`DirectorySink`] writes each artifact into a local directory together
//!   with its `<name>.sha256sum` sidecar. All files are written to temporary
//!   names first and only renamed into place once every write succeeded.
//! - [`GithubReleaseSink`] creates a GitHub release tagged with the current
//!   UTC time and uploads each artifact plus its sidecar as release assets.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::{sidecar_line, Artifact, HashingWriter};
use crate::{Context, Error, Result};

/// Default GitHub REST API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitHub asset upload endpoint.
pub const GITHUB_UPLOADS_URL: &str = "https://uploads.github.com";

/// Destination for a complete artifact set.
pub trait ArtifactSink {
    fn publish(&mut self, artifacts: &[Artifact]) -> Result<()>;
}

/// Sink writing artifacts and sidecars into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write every artifact and sidecar to a temporary name, recording
    /// `(temporary, final)` path pairs as they are created.
    fn stage_files(&self, artifacts: &[Artifact], staged: &mut Vec<(PathBuf, PathBuf)>) -> Result<()> {
        for artifact in artifacts {
            let digest = self
                .write_temp(&artifact.name, &artifact.data, staged)
                .stage("cannot write artifact")?;
            self.write_temp(
                &artifact.sidecar_name(),
                sidecar_line(&digest, &artifact.name).as_bytes(),
                staged,
            )
            .stage("cannot write checksum")?;

            log::debug!("Staged {} (sha256 {})", artifact.name, digest);
        }
        Ok(())
    }

    /// Write one file through the hashing tee and return its hex digest.
    fn write_temp(&self, name: &str, data: &[u8], staged: &mut Vec<(PathBuf, PathBuf)>) -> Result<String> {
        let temp_path = self.dir.join(format!("{}.tmp", name));

        let file = fs::File::create(&temp_path)?;
        staged.push((temp_path, self.dir.join(name)));

        let mut writer = HashingWriter::new(file);
        writer.write_all(data)?;
        writer.flush()?;
        let (file, digest) = writer.finish();
        file.sync_all()?;
        Ok(digest)
    }
}

impl ArtifactSink for DirectorySink {
    /// Nothing is renamed into place until every file has been written.
    fn publish(&mut self, artifacts: &[Artifact]) -> Result<()> {
        fs::create_dir_all(&self.dir).stage("cannot create output directory")?;

        let mut staged = Vec::new();
        if let Err(e) = self.stage_files(artifacts, &mut staged) {
            for (temp_path, _) in &staged {
                if let Err(rm) = fs::remove_file(temp_path) {
                    log::warn!("cannot remove {}: {}", temp_path.display(), rm);
                }
            }
            return Err(e);
        }

        for (temp_path, final_path) in &staged {
            fs::rename(temp_path, final_path).stage("cannot move artifact into place")?;
        }

        for artifact in artifacts {
            log::info!(
                "Wrote {} ({} bytes)",
                self.dir.join(&artifact.name).display(),
                artifact.data.len()
            );
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
}

/// Sink uploading artifacts to a new GitHub release.
pub struct GithubReleaseSink {
    client: reqwest::blocking::Client,
    token: String,
    owner: String,
    repo: String,
}

impl GithubReleaseSink {
    /// Create a release sink.
    ///
    /// A missing or empty token is a configuration error; nothing touches the
    /// network until [`ArtifactSink::publish`].
    pub fn new(token: Option<String>, owner: &str, repo: &str) -> Result<Self> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("GitHub token is required to publish a release".to_string()))?;
        if owner.is_empty() || repo.is_empty() {
            return Err(Error::Config("GitHub owner and repository are required".to_string()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("antizapret-rules/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn create_release(&self, tag: &str) -> Result<u64> {
        let url = format!("{}/repos/{}/{}/releases", GITHUB_API_URL, self.owner, self.repo);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&serde_json::json!({ "tag_name": tag }))
            .send()
            .map_err(|e| Error::Request {
                url: url.clone(),
                source: e,
            })?;

        check_status(&url, &response)?;
        let release: ReleaseResponse = response.json().map_err(|e| Error::Request { url, source: e })?;
        Ok(release.id)
    }

    fn upload_asset(&self, release_id: u64, name: &str, data: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/releases/{}/assets",
            GITHUB_UPLOADS_URL, self.owner, self.repo, release_id
        );
        let response = self
            .client
            .post(&url)
            .query(&[("name", name)])
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .map_err(|e| Error::Request {
                url: url.clone(),
                source: e,
            })?;

        check_status(&url, &response)?;
        log::debug!("Uploaded release asset {}", name);
        Ok(())
    }
}

impl ArtifactSink for GithubReleaseSink {
    fn publish(&mut self, artifacts: &[Artifact]) -> Result<()> {
        let tag = release_tag(Utc::now());
        let release_id = self.create_release(&tag).stage("cannot create github release")?;
        log::info!("Created release {} in {}/{}", tag, self.owner, self.repo);

        for artifact in artifacts {
            self.upload_asset(release_id, &artifact.name, artifact.data.clone())
                .stage("cannot upload release asset")?;
            self.upload_asset(release_id, &artifact.sidecar_name(), artifact.sidecar().into_bytes())
                .stage("cannot upload release asset")?;
        }

        log::info!("Uploaded {} artifacts to release {}", artifacts.len(), tag);
        Ok(())
    }
}

/// Release tag for a point in time, e.g. `20240102030405`.
pub fn release_tag(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

fn check_status(url: &str, response: &reqwest::blocking::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        })
    }
}
