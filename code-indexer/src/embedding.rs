//! Embedding provider client.
//!
//! The indexer and retrieval both embed through this seam. The HTTP variant
//! speaks the Ollama-compatible `/api/embed` batch endpoint; the hash variant
//! is a deterministic in-process fallback used by tests and offline runs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::{IndexerError, IndexerResult};

/// Texts per embedding request.
pub const DEFAULT_EMBED_BATCH: usize = 16;

const REQUEST_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: usize = 3;

/// Configuration for the HTTP embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingHttpConfig {
    /// e.g. `http://localhost:11434`
    pub endpoint: String,
    pub model: String,
}

/// Enum-dispatched embedding client (no trait objects).
#[derive(Debug, Clone)]
pub enum EmbeddingClient {
    Http(HttpEmbedder),
    /// Deterministic token-bucket embedding, dimension 64.
    Hash,
}

impl EmbeddingClient {
    pub fn http(cfg: EmbeddingHttpConfig) -> IndexerResult<Self> {
        Ok(EmbeddingClient::Http(HttpEmbedder::new(cfg)?))
    }

    /// Embed a batch of up to [`DEFAULT_EMBED_BATCH`] texts.
    pub async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        match self {
            EmbeddingClient::Http(h) => h.embed_batch(texts).await,
            EmbeddingClient::Hash => Ok(texts.iter().map(|t| hash_embed(t)).collect()),
        }
    }

    /// Embed one text (query-side convenience).
    pub async fn embed_one(&self, text: &str) -> IndexerResult<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| IndexerError::Embedding("empty embedding response".into()))
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    cfg: EmbeddingHttpConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(cfg: EmbeddingHttpConfig) -> IndexerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { cfg, http })
    }

    async fn embed_batch(&self, texts: &[String]) -> IndexerResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.cfg.endpoint.trim_end_matches('/'));
        let mut last_err: Option<IndexerError> = None;

        for attempt in 1..=MAX_RETRIES {
            let res = self
                .http
                .post(&url)
                .json(&EmbedRequest {
                    model: &self.cfg.model,
                    input: texts,
                })
                .send()
                .await;

            match res {
                Ok(resp) if resp.status().is_success() => {
                    let body: EmbedResponse = resp.json().await?;
                    if body.embeddings.len() != texts.len() {
                        return Err(IndexerError::Embedding(format!(
                            "embedding count mismatch: sent {}, got {}",
                            texts.len(),
                            body.embeddings.len()
                        )));
                    }
                    return Ok(body.embeddings);
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_err = Some(IndexerError::Embedding(format!(
                        "embedding endpoint returned {status}"
                    )));
                    // 4xx won't heal on retry
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("embed attempt {attempt}/{MAX_RETRIES} failed: {e}");
                    last_err = Some(e.into());
                }
            }
        }

        warn!("embedding batch failed after {MAX_RETRIES} attempts");
        Err(last_err.unwrap_or_else(|| IndexerError::Embedding("unknown failure".into())))
    }
}

/// Token-bucket hash embedding: stable across runs, 64 dimensions,
/// L2-normalized so cosine scores stay in a sane range.
fn hash_embed(text: &str) -> Vec<f32> {
    const DIM: usize = 64;
    let mut v = vec![0f32; DIM];
    for token in text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
    {
        let digest = Sha256::digest(token.to_lowercase().as_bytes());
        let bucket = (digest[0] as usize) % DIM;
        v[bucket] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedding_is_deterministic_and_normalized() {
        let client = EmbeddingClient::Hash;
        let a = client.embed_one("fn parse_config(path)").await.unwrap();
        let b = client.embed_one("fn parse_config(path)").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn similar_texts_score_higher_than_unrelated() {
        let client = EmbeddingClient::Hash;
        let q = client.embed_one("parse config file").await.unwrap();
        let near = client.embed_one("config file parser").await.unwrap();
        let far = client.embed_one("websocket frame codec").await.unwrap();
        let cos = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(cos(&q, &near) > cos(&q, &far));
    }
}
