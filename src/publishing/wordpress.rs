//! WordPress REST API adapter

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    RateLimiter,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, rate_limiter, PlatformAdapter, PlatformError, PublishedPost};
use crate::config::WordpressConfig;
use crate::models::Platform;

const POSTS_PATH: &str = "/wp-json/wp/v2/posts";

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    title: &'a str,
    content: &'a str,
    status: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: u64,
    #[serde(default)]
    link: String,
}

pub struct WordpressAdapter {
    config: WordpressConfig,
    client: reqwest::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl WordpressAdapter {
    pub fn new(config: WordpressConfig, requests_per_second: u32) -> Result<Self, PlatformError> {
        Ok(Self {
            config,
            client: http_client()?,
            limiter: rate_limiter(requests_per_second),
        })
    }

    fn posts_url(&self) -> Option<String> {
        let site = self.config.site_url.as_deref()?.trim();
        if site.is_empty() {
            return None;
        }
        Some(format!("{}{POSTS_PATH}", site.trim_end_matches('/')))
    }
}

#[async_trait]
impl PlatformAdapter for WordpressAdapter {
    fn platform(&self) -> Platform {
        Platform::Wordpress
    }

    fn endpoint(&self) -> String {
        POSTS_PATH.to_string()
    }

    async fn create_post(&self, title: &str, body: &str) -> Result<PublishedPost, PlatformError> {
        let url = self.posts_url().ok_or(PlatformError::NotConfigured {
            platform: Platform::Wordpress,
        })?;

        self.limiter.until_ready().await;

        let mut request = self.client.post(url).json(&NewPost {
            title,
            content: body,
            status: &self.config.post_status,
        });
        if let Some(username) = self.config.username.as_deref() {
            request = request.basic_auth(username, self.config.app_password.as_deref());
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedPost = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;

        debug!(post_id = created.id, "WordPress post created");
        Ok(PublishedPost {
            external_id: created.id.to_string(),
            external_url: created.link,
        })
    }
}
