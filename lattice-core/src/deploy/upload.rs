// Release Upload
// Collaborator seam for pushing release artifacts, plus a GitHub client

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::json;

/// Upload failure
#[derive(Debug, Clone)]
pub struct UploadError(pub String);

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UploadError {}

/// One recorded upload request (used by the dry-run uploader)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file_glob: String,
    pub tag: String,
    pub target: String,
}

/// Trait for release-upload collaborators.
///
/// The orchestrator hands over the assembled artifact glob; resolving it to
/// files and pushing them is the uploader's concern.
#[async_trait::async_trait]
pub trait ReleaseUploader: Send + Sync {
    async fn upload(
        &self,
        api_key: &str,
        file_glob: &str,
        tag: &str,
        target: &str,
    ) -> Result<(), UploadError>;
}

/// Uploader that records requests without touching the network.
///
/// Default collaborator: real uploads are opt-in from the CLI.
#[derive(Debug, Default)]
pub struct DryRunUploader {
    requests: Mutex<Vec<UploadRequest>>,
}

impl DryRunUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests recorded so far
    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().expect("uploader lock").clone()
    }
}

#[async_trait::async_trait]
impl ReleaseUploader for DryRunUploader {
    async fn upload(
        &self,
        _api_key: &str,
        file_glob: &str,
        tag: &str,
        target: &str,
    ) -> Result<(), UploadError> {
        self.requests.lock().expect("uploader lock").push(UploadRequest {
            file_glob: file_glob.to_string(),
            tag: tag.to_string(),
            target: target.to_string(),
        });
        Ok(())
    }
}

/// GitHub Releases uploader.
///
/// Creates (or finds) the release for the tag, then attaches every artifact
/// in the artifacts directory whose name matches the glob.
pub struct GithubUploader {
    client: reqwest::Client,
    api_base: String,
    repo: String,
    artifacts_dir: PathBuf,
}

impl GithubUploader {
    pub fn new(repo: impl Into<String>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: "https://api.github.com".to_string(),
            repo: repo.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    /// Override the API base URL (test servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn release_upload_url(&self, api_key: &str, tag: &str) -> Result<String, UploadError> {
        let create_url = format!("{}/repos/{}/releases", self.api_base, self.repo);
        let res = self
            .client
            .post(&create_url)
            .bearer_auth(api_key)
            .header(reqwest::header::USER_AGENT, "lattice")
            .json(&json!({ "tag_name": tag, "name": tag }))
            .send()
            .await
            .map_err(|e| UploadError::new(format!("create release: {}", e)))?;

        // 422 means the release already exists; look it up by tag.
        let res = if res.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let get_url = format!(
                "{}/repos/{}/releases/tags/{}",
                self.api_base, self.repo, tag
            );
            self.client
                .get(&get_url)
                .bearer_auth(api_key)
                .header(reqwest::header::USER_AGENT, "lattice")
                .send()
                .await
                .map_err(|e| UploadError::new(format!("lookup release: {}", e)))?
        } else {
            res
        };

        if !res.status().is_success() {
            return Err(UploadError::new(format!(
                "release request for tag '{}' returned {}",
                tag,
                res.status()
            )));
        }

        let body: serde_json::Value = res
            .json()
            .await
            .map_err(|e| UploadError::new(format!("decode release response: {}", e)))?;
        let upload_url = body
            .get("upload_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| UploadError::new("release response missing upload_url"))?;

        // Strip the {?name,label} template suffix
        Ok(upload_url
            .split('{')
            .next()
            .unwrap_or(upload_url)
            .to_string())
    }

    fn matching_artifacts(&self, file_glob: &str) -> Result<Vec<PathBuf>, UploadError> {
        let entries = std::fs::read_dir(&self.artifacts_dir)
            .map_err(|e| UploadError::new(format!("read artifacts dir: {}", e)))?;

        let mut matched = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| UploadError::new(format!("read artifacts dir: {}", e)))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if glob_match(file_glob, &name) {
                matched.push(entry.path());
            }
        }
        matched.sort();
        Ok(matched)
    }

    async fn attach(
        &self,
        api_key: &str,
        upload_url: &str,
        path: &Path,
    ) -> Result<(), UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| UploadError::new("artifact has no file name"))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::new(format!("read artifact '{}': {}", name, e)))?;

        let res = self
            .client
            .post(upload_url)
            .query(&[("name", name.as_str())])
            .bearer_auth(api_key)
            .header(reqwest::header::USER_AGENT, "lattice")
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::new(format!("upload '{}': {}", name, e)))?;

        if !res.status().is_success() {
            return Err(UploadError::new(format!(
                "upload '{}' returned {}",
                name,
                res.status()
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReleaseUploader for GithubUploader {
    async fn upload(
        &self,
        api_key: &str,
        file_glob: &str,
        tag: &str,
        _target: &str,
    ) -> Result<(), UploadError> {
        let artifacts = self.matching_artifacts(file_glob)?;
        if artifacts.is_empty() {
            return Err(UploadError::new(format!(
                "no artifacts matching '{}' in {}",
                file_glob,
                self.artifacts_dir.display()
            )));
        }

        let upload_url = self.release_upload_url(api_key, tag).await?;
        for path in &artifacts {
            self.attach(api_key, &upload_url, path).await?;
        }
        Ok(())
    }
}

/// Match a file name against a glob where '*' matches any (possibly empty)
/// run of characters. The artifact template only ever produces a trailing
/// `.*`, but segment-wise matching keeps this honest for custom globs.
fn glob_match(pattern: &str, name: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == name;
    }

    let mut rest = name;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_uploader_records() {
        let uploader = DryRunUploader::new();
        uploader
            .upload("key", "myproj-v1.2.0-x86_64-apple-darwin.*", "v1.2.0", "x86_64-apple-darwin")
            .await
            .unwrap();

        let requests = uploader.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tag, "v1.2.0");
        assert_eq!(
            requests[0].file_glob,
            "myproj-v1.2.0-x86_64-apple-darwin.*"
        );
    }

    #[test]
    fn test_glob_match_artifact_template() {
        let glob = "myproj-v1.2.0-x86_64-apple-darwin.*";
        assert!(glob_match(glob, "myproj-v1.2.0-x86_64-apple-darwin.tar.gz"));
        assert!(glob_match(glob, "myproj-v1.2.0-x86_64-apple-darwin.zip"));
        assert!(!glob_match(glob, "myproj-v1.2.0-x86_64-unknown-linux-gnu.tar.gz"));
        assert!(!glob_match(glob, "other-v1.2.0-x86_64-apple-darwin.tar.gz"));
    }

    #[test]
    fn test_glob_match_exact_and_inner_star() {
        assert!(glob_match("exact.txt", "exact.txt"));
        assert!(!glob_match("exact.txt", "exact.txt.bak"));
        assert!(glob_match("a*b", "a-anything-b"));
        assert!(glob_match("a*b", "ab"));
        assert!(!glob_match("a*b", "a-anything-c"));
    }

    #[test]
    fn test_matching_artifacts_filters_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("myproj-v1-t.tar.gz"), b"x").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"x").unwrap();

        let uploader = GithubUploader::new("me/myproj", dir.path());
        let matched = uploader.matching_artifacts("myproj-v1-t.*").unwrap();
        assert_eq!(matched.len(), 1);
        assert!(matched[0].ends_with("myproj-v1-t.tar.gz"));
    }
}
