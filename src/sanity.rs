//! Sanity content lake client.
//!
//! Posts are read with GROQ queries over the HTTP query API. All queries are read-only and
//! idempotent: there are no retries, a failed page render will just query again.
//!
//! Reference doc: https://www.sanity.io/docs/http-query

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::SanityConfig;
use crate::portable_text::{Post, PostSummary};

pub const POST_LIST_QUERY: &str = r#"*[_type == "post"] { title, slug, summary, techStack, thumbnail }"#;

pub const POST_BY_SLUG_QUERY: &str = r#"*[_type == "post" && slug.current == $slug][0] {
  title,
  slug,
  summary,
  description,
  videoUrl,
  techStack,
  thumbnail
}"#;

/// Where pages get their posts from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// All posts, projected to listing fields. Order is defined by the source.
    async fn fetch_post_list(&self) -> anyhow::Result<Vec<PostSummary>>;

    /// A single post by its slug, or `None` if there's no such post.
    async fn fetch_post_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>>;
}

//-------------------------------------------------------------------------------------------------
// HTTP client

pub struct SanityClient {
    http: reqwest::Client,
    query_url: url::Url,
}

impl SanityClient {
    pub fn new(config: &SanityConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Problem creating HTTP client")?;

        Ok(SanityClient {
            http,
            query_url: query_endpoint(config)?,
        })
    }

    /// Builds the URL of a query. Parameter values are JSON-encoded, as required by the API.
    pub fn query_url(&self, query: &str, params: &BTreeMap<&str, Value>) -> anyhow::Result<url::Url> {
        let mut url = self.query_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            for (name, value) in params {
                pairs.append_pair(&format!("${}", name), &serde_json::to_string(value)?);
            }
        }
        Ok(url)
    }

    /// Runs a query and returns its `result`.
    pub async fn fetch<T: DeserializeOwned>(&self, query: &str, params: &BTreeMap<&str, Value>) -> anyhow::Result<T> {
        let url = self.query_url(query, params)?;
        debug!("Querying {}", url);

        let response = self.http.get(url)
            .send()
            .await
            .context("Failed to query the content lake")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read query response")?;

        parse_response(status, &body)
    }
}

#[async_trait]
impl ContentSource for SanityClient {
    async fn fetch_post_list(&self) -> anyhow::Result<Vec<PostSummary>> {
        // A missing result (no posts at all) is an empty list
        let posts: Option<Vec<PostSummary>> = self.fetch(POST_LIST_QUERY, &BTreeMap::new()).await?;
        Ok(posts.unwrap_or_default())
    }

    async fn fetch_post_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
        let params = BTreeMap::from([("slug", Value::from(slug))]);
        self.fetch(POST_BY_SLUG_QUERY, &params)
            .await
            .with_context(|| format!("Failed to load post '{}'", slug))
    }
}

fn query_endpoint(config: &SanityConfig) -> anyhow::Result<url::Url> {
    let host = if config.use_cdn { "apicdn" } else { "api" };
    let version = config.api_version.trim_start_matches('v');
    let url = format!(
        "https://{}.{}.sanity.io/v{}/data/query/{}",
        config.project_id, host, version, config.dataset
    );
    url::Url::parse(&url).with_context(|| format!("Invalid Sanity query endpoint {}", url))
}

#[derive(Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Deserialize)]
struct ErrorDetails {
    description: Option<String>,
    message: Option<String>,
}

/// Extracts the result of a query response, or its error description.
pub fn parse_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> anyhow::Result<T> {
    if !status.is_success() {
        let description = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.error.description.or(e.error.message))
            .unwrap_or_else(|| body.chars().take(200).collect());
        bail!("Query failed with HTTP status {}: {}", status, description);
    }

    let response: QueryResponse<T> = serde_json::from_str(body).context("Unexpected query response")?;
    Ok(response.result)
}

//-------------------------------------------------------------------------------------------------
// Local content

/// Posts loaded once from a JSON export (an array of post documents), for offline rendering.
pub struct StaticSource {
    posts: Vec<Post>,
}

impl StaticSource {
    pub fn new(posts: Vec<Post>) -> Self {
        StaticSource { posts }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to open {:?}", path))?;
        let posts = serde_json::from_str(&json).with_context(|| format!("Failed to read posts from {:?}", path))?;
        Ok(StaticSource::new(posts))
    }
}

#[async_trait]
impl ContentSource for StaticSource {
    async fn fetch_post_list(&self) -> anyhow::Result<Vec<PostSummary>> {
        Ok(self.posts.iter().map(PostSummary::from).collect())
    }

    async fn fetch_post_by_slug(&self, slug: &str) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.iter().find(|post| post.slug.as_str() == slug).cloned())
    }
}
