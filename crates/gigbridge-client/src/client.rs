use gigbridge_common::{Error, Result};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::urn::Urn;

/// Thin HTTP client for the gig service's messaging API.
///
/// The bridge only needs to push already-formed messages and reactions; the
/// service's realtime feed and the rest of its API are out of scope here.
#[derive(Debug)]
pub struct GigClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    message_urn: String,
}

impl GigClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Client(format!("invalid gig API base URL: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Client(format!("invalid endpoint path '{path}': {e}")))
    }

    /// Verifies the token against the API. Called once at startup.
    pub async fn ping(&self) -> Result<()> {
        let url = self.endpoint("v1/me")?;
        debug!("pinging gig API at {url}");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Client(format!("gig API unreachable: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Client(format!(
                "gig API rejected credentials: {}",
                resp.status()
            )));
        }
        info!("gig API connection verified");
        Ok(())
    }

    /// Sends a text message into a thread, returning the new message's URN.
    pub async fn send_message(&self, thread_urn: &Urn, text: &str) -> Result<Urn> {
        let url = self.endpoint("v1/messages")?;
        debug!("sending message to {thread_urn}");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "thread_urn": thread_urn.as_str(),
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| Error::Client(format!("failed to send message: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Client(format!(
                "gig API refused message: {}",
                resp.status()
            )));
        }
        let body: SendMessageResponse = resp
            .json()
            .await
            .map_err(|e| Error::Client(format!("malformed send response: {e}")))?;
        Ok(Urn::new(body.message_urn))
    }

    /// Adds an emoji reaction to a message.
    pub async fn react(&self, message_urn: &Urn, emoji: &str) -> Result<()> {
        let url = self.endpoint("v1/reactions")?;
        debug!("reacting to {message_urn} with {emoji}");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "message_urn": message_urn.as_str(),
                "emoji": emoji,
            }))
            .send()
            .await
            .map_err(|e| Error::Client(format!("failed to send reaction: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Client(format!(
                "gig API refused reaction: {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
