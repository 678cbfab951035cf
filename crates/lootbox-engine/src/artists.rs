//! Art generators: turn one prompt into a batch of raster images on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{Rgb, RgbImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{non_empty_env, ArtistKind};
use crate::http::response_json_or_error;

pub const DEFAULT_ART_SIZE: u32 = 1024;

#[derive(Debug, Clone)]
pub struct ArtRequest {
    pub prompt: String,
    pub count: u64,
    /// Images are written here as `<stem>-<idx>.png`.
    pub out_dir: PathBuf,
    pub stem: String,
    pub size: u32,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ArtResponse {
    pub images: Vec<PathBuf>,
    pub revised_prompt: Option<String>,
}

pub trait ArtGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ArtRequest) -> Result<ArtResponse>;
}

#[derive(Default)]
pub struct ArtistRegistry {
    artists: BTreeMap<String, Box<dyn ArtGenerator>>,
}

impl ArtistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<A: ArtGenerator + 'static>(&mut self, artist: A) {
        self.artists
            .insert(artist.name().to_string(), Box::new(artist));
    }

    pub fn take(&mut self, name: &str) -> Option<Box<dyn ArtGenerator>> {
        self.artists.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.artists.keys().cloned().collect()
    }
}

pub fn default_artist_registry() -> ArtistRegistry {
    let mut registry = ArtistRegistry::new();
    registry.register(DryrunArtist);
    registry.register(OpenAiArtist::new());
    registry
}

pub fn artist_for(kind: ArtistKind) -> Result<Box<dyn ArtGenerator>> {
    let mut registry = default_artist_registry();
    let names = registry.names();
    registry
        .take(kind.as_str())
        .with_context(|| format!("artist {} not registered (have {names:?})", kind.as_str()))
}

fn image_path(request: &ArtRequest, idx: u64) -> PathBuf {
    request.out_dir.join(format!("{}-{idx}.png", request.stem))
}

/// Writes solid-color images whose color is derived from the prompt.
pub struct DryrunArtist;

impl ArtGenerator for DryrunArtist {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ArtRequest) -> Result<ArtResponse> {
        fs::create_dir_all(&request.out_dir)
            .with_context(|| format!("failed to create {}", request.out_dir.display()))?;
        let mut images = Vec::new();
        for idx in 0..request.count {
            let path = image_path(request, idx);
            write_dryrun_image(&path, request.size, &request.prompt, idx)?;
            images.push(path);
        }
        Ok(ArtResponse {
            images,
            revised_prompt: None,
        })
    }
}

fn write_dryrun_image(path: &Path, size: u32, prompt: &str, idx: u64) -> Result<()> {
    let (r, g, b) = color_from_prompt(prompt, idx);
    let mut image = RgbImage::new(size.max(1), size.max(1));
    for pixel in image.pixels_mut() {
        *pixel = Rgb([r, g, b]);
    }
    image
        .save(path)
        .with_context(|| format!("failed to save {}", path.display()))
}

fn color_from_prompt(prompt: &str, idx: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(idx.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

pub struct OpenAiArtist {
    api_base: String,
    http: HttpClient,
}

impl Default for OpenAiArtist {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiArtist {
    pub fn new() -> Self {
        Self {
            api_base: non_empty_env("OPENAI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            http: HttpClient::new(),
        }
    }

    fn payload(request: &ArtRequest) -> Value {
        json!({
            "model": request.model,
            "prompt": request.prompt,
            "n": request.count.max(1),
            "size": format!("{0}x{0}", request.size),
            "response_format": "b64_json",
        })
    }

    fn decode_images(request: &ArtRequest, response_payload: &Value) -> Result<ArtResponse> {
        let rows = response_payload
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut images = Vec::new();
        let mut revised_prompt = None;
        for (idx, row) in rows.iter().take(request.count.max(1) as usize).enumerate() {
            let Some(b64) = row.get("b64_json").and_then(Value::as_str) else {
                continue;
            };
            let bytes = BASE64
                .decode(b64.as_bytes())
                .context("OpenAI image base64 decode failed")?;
            let path = image_path(request, idx as u64);
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            images.push(path);
            if revised_prompt.is_none() {
                revised_prompt = row
                    .get("revised_prompt")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
        if images.is_empty() {
            bail!("OpenAI response returned no images");
        }
        Ok(ArtResponse {
            images,
            revised_prompt,
        })
    }
}

impl ArtGenerator for OpenAiArtist {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, request: &ArtRequest) -> Result<ArtResponse> {
        let Some(api_key) = non_empty_env("OPENAI_API_KEY") else {
            bail!("OPENAI_API_KEY not set");
        };
        fs::create_dir_all(&request.out_dir)
            .with_context(|| format!("failed to create {}", request.out_dir.display()))?;
        let endpoint = format!("{}/images/generations", self.api_base);
        debug!(
            endpoint = endpoint.as_str(),
            model = request.model.as_str(),
            count = request.count,
            "requesting artwork"
        );
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&Self::payload(request))
            .send()
            .with_context(|| format!("OpenAI request failed ({endpoint})"))?;
        let parsed = response_json_or_error("OpenAI", response)?;
        Self::decode_images(request, &parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(out_dir: &Path) -> ArtRequest {
        ArtRequest {
            prompt: "cat with blue eyes in a snowy background, drawn in a toon style".to_string(),
            count: 4,
            out_dir: out_dir.to_path_buf(),
            stem: "xlb-0".to_string(),
            size: 8,
            model: "dall-e-2".to_string(),
        }
    }

    #[test]
    fn dryrun_writes_one_image_per_slot() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let response = DryrunArtist.generate(&request(temp.path()))?;
        assert_eq!(response.images.len(), 4);
        for path in &response.images {
            let image = image::open(path)?;
            assert_eq!(image.width(), 8);
        }
        Ok(())
    }

    #[test]
    fn dryrun_color_follows_prompt() {
        assert_eq!(color_from_prompt("a", 0), color_from_prompt("a", 0));
        assert_ne!(color_from_prompt("a", 0), color_from_prompt("b", 0));
    }

    #[test]
    fn openai_payload_requests_base64() {
        let req = request(Path::new("/tmp"));
        let payload = OpenAiArtist::payload(&req);
        assert_eq!(payload["response_format"], json!("b64_json"));
        assert_eq!(payload["size"], json!("8x8"));
        assert_eq!(payload["n"], json!(4));
    }

    #[test]
    fn openai_response_decodes_images_and_revised_prompt() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let req = request(temp.path());
        let body = json!({
            "data": [
                {"b64_json": BASE64.encode(b"not-really-a-png"), "revised_prompt": "a festive cat"},
                {"url": "https://example.test/skip.png"},
            ]
        });
        let response = OpenAiArtist::decode_images(&req, &body)?;
        assert_eq!(response.images.len(), 1);
        assert_eq!(response.revised_prompt.as_deref(), Some("a festive cat"));
        assert_eq!(fs::read(&response.images[0])?, b"not-really-a-png");
        Ok(())
    }

    #[test]
    fn empty_openai_response_is_an_error() {
        let req = request(Path::new("/tmp"));
        assert!(OpenAiArtist::decode_images(&req, &json!({"data": []})).is_err());
    }

    #[test]
    fn registry_resolves_known_artists() {
        let names = default_artist_registry().names();
        assert_eq!(names, vec!["dryrun".to_string(), "openai".to_string()]);
        assert!(artist_for(ArtistKind::Dryrun).is_ok());
    }
}
