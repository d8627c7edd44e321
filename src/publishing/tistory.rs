//! Tistory Open API adapter

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    RateLimiter,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{http_client, rate_limiter, PlatformAdapter, PlatformError, PublishedPost};
use crate::config::TistoryConfig;
use crate::models::Platform;

const WRITE_PATH: &str = "/apis/post/write";

#[derive(Debug, Deserialize)]
struct WriteResponse {
    tistory: WriteBody,
}

#[derive(Debug, Deserialize)]
struct WriteBody {
    status: String,
    #[serde(rename = "postId")]
    post_id: Option<Value>,
    url: Option<String>,
    error_message: Option<String>,
}

pub struct TistoryAdapter {
    config: TistoryConfig,
    client: reqwest::Client,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl TistoryAdapter {
    pub fn new(config: TistoryConfig, requests_per_second: u32) -> Result<Self, PlatformError> {
        Ok(Self {
            config,
            client: http_client()?,
            limiter: rate_limiter(requests_per_second),
        })
    }

    fn write_url(&self) -> String {
        format!("{}{WRITE_PATH}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PlatformAdapter for TistoryAdapter {
    fn platform(&self) -> Platform {
        Platform::Tistory
    }

    fn endpoint(&self) -> String {
        WRITE_PATH.to_string()
    }

    async fn create_post(&self, title: &str, body: &str) -> Result<PublishedPost, PlatformError> {
        let (Some(token), Some(blog_name)) = (
            self.config.access_token.as_deref(),
            self.config.blog_name.as_deref(),
        ) else {
            return Err(PlatformError::NotConfigured {
                platform: Platform::Tistory,
            });
        };
        if !self.config.is_configured() {
            return Err(PlatformError::NotConfigured {
                platform: Platform::Tistory,
            });
        }

        self.limiter.until_ready().await;

        let visibility = self.config.visibility.to_string();
        let form = [
            ("access_token", token),
            ("output", "json"),
            ("blogName", blog_name),
            ("title", title),
            ("content", body),
            ("visibility", visibility.as_str()),
        ];

        let response = self.client.post(self.write_url()).form(&form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: WriteResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;
        let result = parsed.tistory;

        if result.status != "200" {
            return Err(PlatformError::Api(
                result
                    .error_message
                    .unwrap_or_else(|| format!("status {}", result.status)),
            ));
        }

        // postId comes back as a string, some older blogs return a number
        let external_id = match result.post_id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(PlatformError::InvalidResponse(
                    "missing postId".to_string(),
                ))
            }
        };
        let external_url = result.url.unwrap_or_default();

        debug!(post_id = %external_id, "Tistory post created");
        Ok(PublishedPost {
            external_id,
            external_url,
        })
    }
}
