use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use tracing::info;

use crate::retry::RetryPolicy;


pub const IPFS_SCHEME: &str = "ipfs://";
pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";


/// Rewrites a content-addressed pointer to its public-gateway HTTP form.
/// Anything that is not `ipfs://` passes through untouched.
pub fn rewrite_content_uri(uri: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(rest) => format!("{}{}", IPFS_GATEWAY, rest),
        None => uri.to_string(),
    }
}


/// Outcome of dereferencing an off-chain document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    Found(Vec<u8>),
    /// The endpoint reported HTTP 410: the content was deliberately
    /// removed upstream and will never reappear.
    Gone,
}


/// Off-chain document store collaborator.
#[async_trait]
pub trait DocumentStore {
    async fn get(&self, url: &str) -> anyhow::Result<Document>;
}


pub struct HttpDocumentStore {
    http: reqwest::Client,
}

impl HttpDocumentStore {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Default for HttpDocumentStore {
    fn default() -> Self {
        Self::new(dropfill_chain_client::default_http_client())
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, url: &str) -> anyhow::Result<Document> {
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::GONE {
            return Ok(Document::Gone);
        }
        let response = response.error_for_status()?;
        Ok(Document::Found(response.bytes().await?.to_vec()))
    }
}


/// Downloads a token image, shrinks it into the given bounding box and
/// returns it base64-encoded for the vision call.
///
/// Images are kept on disk under their trailing URL segment, so a
/// re-run reuses the normalized file instead of downloading again.
pub async fn download_image<D: DocumentStore + ?Sized>(
    store: &D,
    url: &str,
    dir: &Path,
    resolution: [u32; 2],
    retry: &RetryPolicy,
) -> anyhow::Result<String> {
    let image_path = local_image_path(url, dir);

    if !image_path.exists() {
        info!(url, "downloading the image");

        let bytes = retry
            .run("image download", || async {
                match store.get(url).await? {
                    Document::Found(bytes) => Ok(bytes),
                    Document::Gone => anyhow::bail!("image endpoint returned HTTP 410"),
                }
            })
            .await?;

        let image = image::load_from_memory(&bytes)?;
        info!(
            width = resolution[0],
            height = resolution[1],
            "normalizing the image"
        );
        let image = image.thumbnail(resolution[0], resolution[1]);

        std::fs::create_dir_all(dir)?;
        image.save_with_format(&image_path, image::ImageFormat::Png)?;
    } else {
        info!(path = %image_path.display(), "using a saved image");
    }

    let bytes = std::fs::read(&image_path)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}


fn local_image_path(url: &str, dir: &Path) -> PathBuf {
    let hash = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    dir.join(format!("{}.png", hash))
}
