use crate::error::{Error, ErrorKind};
use crate::people::{OwnIdentity, SubscriberRecord, SubscriptionRecord};
use crate::post::{NewPost, Post};
use crate::pubkey::PublicKey;
use crate::service::{Detail, Service};
use crate::settings::Settings;
use crate::USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Talks HTTP to the node's service
#[derive(Debug)]
pub struct Fetcher {
    /// HTTP client (internally an Arc)
    client: Client,

    /// Base URL every endpoint path is joined onto. Ends in a slash.
    origin: Url,

    set_user_agent: bool,

    /// How many body bytes have been read from the service
    bytes_read: AtomicUsize,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Fetcher, Error> {
        let origin = settings.origin_url()?;

        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_sec))
            .timeout(Duration::from_secs(settings.request_timeout_sec))
            .build()?;

        Ok(Fetcher {
            client,
            origin,
            set_user_agent: settings.set_user_agent,
            bytes_read: AtomicUsize::new(0),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.origin.join(path)?)
    }

    fn prepare(&self, req: RequestBuilder) -> RequestBuilder {
        if self.set_user_agent {
            req.header("User-Agent", USER_AGENT)
        } else {
            req
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: Url,
    ) -> Result<T, Error> {
        tracing::debug!("GET {}", url);
        let response = self.prepare(self.client.get(url)).send().await?;
        let bytes = self.read_body(response).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ErrorKind::MalformedResponse(endpoint, e).into())
    }

    // Reads the whole body, turning a non-success status into a service error
    async fn read_body(&self, response: Response) -> Result<Vec<u8>, Error> {
        let status = response.status();
        let bytes = response.bytes().await?;
        self.bytes_read.fetch_add(bytes.len(), Ordering::Relaxed);
        if !status.is_success() {
            return Err(ErrorKind::Service {
                status: status.as_u16(),
                detail: error_detail(status, &bytes),
            }
            .into());
        }
        Ok(bytes.to_vec())
    }
}

/// The message to show for a failed request. Services answer errors with a
/// `{"detail": ...}` body; anything else falls back to the status line.
fn error_detail(status: reqwest::StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[async_trait]
impl Service for Fetcher {
    async fn timeline(&self) -> Result<Vec<Post>, Error> {
        self.get_json("timeline", self.endpoint("timeline")?).await
    }

    async fn own_identity(&self) -> Result<OwnIdentity, Error> {
        self.get_json("pubkey", self.endpoint("pubkey")?).await
    }

    async fn subscriptions(&self) -> Result<Vec<SubscriptionRecord>, Error> {
        self.get_json("subscriptions", self.endpoint("subscriptions")?)
            .await
    }

    async fn subscribed(&self) -> Result<Vec<SubscriberRecord>, Error> {
        self.get_json("subscribed", self.endpoint("subscribed")?)
            .await
    }

    async fn subscribe(&self, pubkey: &PublicKey, alias: &str) -> Result<Detail, Error> {
        let mut url = self.endpoint("subscribe")?;
        url.query_pairs_mut()
            .append_pair("pubkey", pubkey.as_str())
            .append_pair("alias", alias);
        self.get_json("subscribe", url).await
    }

    async fn unsubscribe(&self, pubkey: &PublicKey) -> Result<Detail, Error> {
        let mut url = self.endpoint("unsubscribe")?;
        url.query_pairs_mut().append_pair("pubkey", pubkey.as_str());
        self.get_json("unsubscribe", url).await
    }

    async fn post(&self, post: &NewPost) -> Result<(), Error> {
        let url = self.endpoint("post")?;
        tracing::debug!("POST {}", url);
        let response = self.prepare(self.client.post(url)).json(post).send().await?;
        // Any success will do, the body carries nothing we need
        let _ = self.read_body(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(StatusCode::BAD_REQUEST, br#"{"detail":"Already subscribed"}"#),
            "Already subscribed"
        );
        assert_eq!(
            error_detail(StatusCode::UNPROCESSABLE_ENTITY, br#"{"detail":[{"msg":"x"}]}"#),
            r#"[{"msg":"x"}]"#
        );
        assert_eq!(
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, b"oops"),
            "500 Internal Server Error"
        );
    }

    #[test]
    fn test_endpoints_join_onto_origin() {
        let settings = Settings {
            origin: "http://node.example:8000/api".to_owned(),
            ..Default::default()
        };
        let fetcher = Fetcher::new(&settings).unwrap();
        assert_eq!(
            fetcher.endpoint("timeline").unwrap().as_str(),
            "http://node.example:8000/api/timeline"
        );
    }
}
