//! Content-addressed storage for finished artwork and metadata.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{non_empty_env, ContentStoreKind};
use crate::http::response_json_or_error;

pub trait ContentStore: Send + Sync {
    fn name(&self) -> &str;
    /// Pins every file as one directory and returns its content id.
    fn pin(&self, files: &[PathBuf]) -> Result<String>;
    fn uri(&self, cid: &str, file_name: &str) -> String {
        format!("ipfs://{cid}/{file_name}")
    }
}

pub fn content_store_for(kind: ContentStoreKind, local_root: &Path) -> Box<dyn ContentStore> {
    match kind {
        ContentStoreKind::Local => Box::new(LocalContentStore::new(local_root)),
        ContentStoreKind::Pinata => Box::new(PinataStore::new()),
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|value| value.to_str())
        .map(str::to_string)
        .with_context(|| format!("not a file path: {}", path.display()))
}

fn directory_name(files: &[PathBuf]) -> String {
    files
        .first()
        .and_then(|path| path.parent())
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("gifts")
        .to_string()
}

/// Stores pinned directories under `<root>/<cid>/`; cid is the sha256 of
/// every file name and its bytes, in order.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, cid: &str, file_name: &str) -> PathBuf {
        self.root.join(cid).join(file_name)
    }
}

impl ContentStore for LocalContentStore {
    fn name(&self) -> &str {
        "local"
    }

    fn pin(&self, files: &[PathBuf]) -> Result<String> {
        if files.is_empty() {
            bail!("nothing to pin");
        }
        let mut hasher = Sha256::new();
        let mut payloads = Vec::with_capacity(files.len());
        for path in files {
            let name = file_name_of(path)?;
            let bytes =
                fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
            hasher.update(name.as_bytes());
            hasher.update(&bytes);
            payloads.push((name, bytes));
        }
        let cid = hex::encode(hasher.finalize());
        debug!(cid = cid.as_str(), files = files.len(), "pinned locally");
        let dir = self.root.join(&cid);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        for (name, bytes) in payloads {
            let target = dir.join(&name);
            fs::write(&target, bytes)
                .with_context(|| format!("failed to write {}", target.display()))?;
        }
        Ok(cid)
    }
}

pub struct PinataStore {
    api_base: String,
    http: HttpClient,
}

impl Default for PinataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PinataStore {
    pub fn new() -> Self {
        Self {
            api_base: non_empty_env("PINATA_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.pinata.cloud".to_string()),
            http: HttpClient::new(),
        }
    }

    fn pinata_metadata(files: &[PathBuf]) -> Value {
        json!({ "name": directory_name(files) })
    }

    fn ipfs_hash(response_payload: &Value) -> Result<String> {
        response_payload
            .get("IpfsHash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("Pinata response missing IpfsHash")
    }
}

impl ContentStore for PinataStore {
    fn name(&self) -> &str {
        "pinata"
    }

    fn pin(&self, files: &[PathBuf]) -> Result<String> {
        let (Some(api_key), Some(secret)) = (
            non_empty_env("PINATA_API_KEY"),
            non_empty_env("PINATA_SECRET_KEY"),
        ) else {
            bail!("PINATA_API_KEY or PINATA_SECRET_KEY not set");
        };
        if files.is_empty() {
            bail!("nothing to pin");
        }

        let dir = directory_name(files);
        let mut form = MultipartForm::new().text(
            "pinataMetadata",
            Self::pinata_metadata(files).to_string(),
        );
        for path in files {
            let bytes =
                fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
            let name = file_name_of(path)?;
            form = form.part("file", MultipartPart::bytes(bytes).file_name(format!("{dir}/{name}")));
        }

        let endpoint = format!("{}/pinning/pinFileToIPFS", self.api_base);
        debug!(
            endpoint = endpoint.as_str(),
            dir = dir.as_str(),
            files = files.len(),
            "pinning to Pinata"
        );
        let response = self
            .http
            .post(&endpoint)
            .header("pinata_api_key", api_key)
            .header("pinata_secret_api_key", secret)
            .multipart(form)
            .send()
            .with_context(|| format!("Pinata request failed ({endpoint})"))?;
        let parsed = response_json_or_error("Pinata", response)?;
        Self::ipfs_hash(&parsed)
    }
}
