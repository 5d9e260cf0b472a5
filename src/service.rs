use crate::error::Error;
use crate::people::{OwnIdentity, SubscriberRecord, SubscriptionRecord};
use crate::post::{NewPost, Post};
use crate::pubkey::PublicKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the follow endpoints answer with, whether they succeed or not
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

/// The node's HTTP service, as seen by the client.
///
/// `Fetcher` talks to a real node. Anything else implementing this (a
/// test double, a different transport) can drive the Syncer and Overlord.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn timeline(&self) -> Result<Vec<Post>, Error>;

    async fn own_identity(&self) -> Result<OwnIdentity, Error>;

    async fn subscriptions(&self) -> Result<Vec<SubscriptionRecord>, Error>;

    async fn subscribed(&self) -> Result<Vec<SubscriberRecord>, Error>;

    async fn subscribe(&self, pubkey: &PublicKey, alias: &str) -> Result<Detail, Error>;

    async fn unsubscribe(&self, pubkey: &PublicKey) -> Result<Detail, Error>;

    async fn post(&self, post: &NewPost) -> Result<(), Error>;
}
