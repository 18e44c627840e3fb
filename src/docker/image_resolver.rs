// ABOUTME: Resolves an image reference to a local image, pulling it when no local match exists

use super::engine::ContainerEngine;
use crate::session::{OutputSink, SessionError};
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

const DEFAULT_TAG: &str = "latest";
const DIGEST_STATUS_PREFIX: &str = "Digest: ";

/// Image name and tag, e.g. `ubuntu` + `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Parse `name[:tag]`. A colon before the last `/` is a registry port, not a tag.
    pub fn parse(reference: &str) -> Self {
        let last_segment_start = reference.rfind('/').map_or(0, |i| i + 1);

        match reference[last_segment_start..].rfind(':') {
            Some(i) if i + 1 < reference.len() - last_segment_start => {
                let split = last_segment_start + i;
                Self::new(&reference[..split], &reference[split + 1..])
            }
            Some(i) => Self::new(&reference[..last_segment_start + i], DEFAULT_TAG),
            None => Self::new(reference, DEFAULT_TAG),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The pull string handed to the engine.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub reference: ImageReference,
    /// Digest without its algorithm prefix. Empty when a pull never reported one.
    pub digest: String,
    pub pulled: bool,
}

/// Strip an algorithm prefix such as `sha256:`.
pub fn strip_digest_algorithm(digest: &str) -> &str {
    digest.split_once(':').map_or(digest, |(_, hex)| hex)
}

/// Digest carried by a pull status line, if the line reports one.
pub fn digest_from_status(status: &str) -> Option<&str> {
    status
        .strip_prefix(DIGEST_STATUS_PREFIX)
        .map(|digest| strip_digest_algorithm(digest.trim()))
}

pub struct ImageResolver<'a> {
    engine: &'a dyn ContainerEngine,
    output: &'a OutputSink,
}

impl<'a> ImageResolver<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, output: &'a OutputSink) -> Self {
        Self { engine, output }
    }

    pub async fn resolve(&self, reference: &ImageReference) -> Result<ResolvedImage, SessionError> {
        let canonical = reference.canonical();

        let images = self
            .engine
            .find_image(&canonical)
            .await
            .map_err(SessionError::Lookup)?;

        if let Some(image) = images.first() {
            debug!("Image {} already exists locally as {}", canonical, image.id);
            return Ok(ResolvedImage {
                reference: reference.clone(),
                digest: strip_digest_algorithm(&image.id).to_string(),
                pulled: false,
            });
        }

        let digest = self.pull(&canonical).await?;
        Ok(ResolvedImage {
            reference: reference.clone(),
            digest,
            pulled: true,
        })
    }

    async fn pull(&self, canonical: &str) -> Result<String, SessionError> {
        let mut stream = self.engine.pull_image(canonical);
        let mut digest = String::new();

        // Progress and terminal lines interleave, so the stream is always drained.
        while let Some(status) = stream.next().await {
            let status: String = status.map_err(SessionError::Pull)?;
            self.output.line(&status);

            if let Some(found) = digest_from_status(&status) {
                digest = found.to_string();
            }
        }

        if digest.is_empty() {
            warn!("Pull of {} finished without reporting a digest", canonical);
        } else {
            info!("Pulled image {} ({})", canonical, digest);
        }

        Ok(digest)
    }
}
