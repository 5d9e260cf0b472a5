#![allow(dead_code)]

use async_trait::async_trait;
use murmur::people::{OwnIdentity, SubscriberRecord, SubscriptionRecord};
use murmur::{Detail, Error, ErrorKind, NewPost, Post, PublicKey, Service};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub const OWN_KEY: &str = "MCowBQYDK2VwAyEAaGHMrIKC3h27SO99YbKEUfUEXDOXjJHYOA5uWHR/rCU=";

/// Long enough that no tick fires during a test
pub const NO_TICKS: Duration = Duration::from_secs(600);

pub const WAIT: Duration = Duration::from_secs(5);

pub fn pk(s: &str) -> PublicKey {
    PublicKey::try_from_str(s).unwrap()
}

/// Holds requests to one endpoint until released
struct Gate {
    permits: Semaphore,
    arrived: Mutex<usize>,
    arrived_notify: Notify,
}

impl Gate {
    fn new() -> Gate {
        Gate {
            permits: Semaphore::new(0),
            arrived: Mutex::new(0),
            arrived_notify: Notify::new(),
        }
    }
}

#[derive(Default)]
struct State {
    subscriptions: Vec<SubscriptionRecord>,
    subscribed: Vec<SubscriberRecord>,
    posts: Vec<Post>,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
}

/// An in-memory node. Endpoints behave like a real node's: subscribe is a
/// no-op for keys already followed and unsubscribe answers with a detail
/// for keys not followed.
#[derive(Default)]
pub struct FakeNode {
    state: Mutex<State>,
    gates: Mutex<HashMap<&'static str, Arc<Gate>>>,
}

impl FakeNode {
    pub fn new() -> Arc<FakeNode> {
        Arc::new(FakeNode::default())
    }

    pub fn add_subscription(&self, pubkey: &str, alias: &str) {
        self.state.lock().subscriptions.push(SubscriptionRecord {
            pubkey: pk(pubkey),
            alias: alias.to_owned(),
        });
    }

    pub fn add_subscriber(&self, pubkey: &str) {
        self.state
            .lock()
            .subscribed
            .push(SubscriberRecord { pubkey: pk(pubkey) });
    }

    pub fn add_post(&self, author: &str, alias: &str, text: &str) {
        let mut state = self.state.lock();
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": state.posts.len(),
            "text": text,
            "timestamp": 1670706509,
            "author_alias": alias,
            "author": author,
        }))
        .unwrap();
        state.posts.push(post);
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionRecord> {
        self.state.lock().subscriptions.clone()
    }

    pub fn calls(&self, endpoint: &'static str) -> usize {
        self.state.lock().calls.get(endpoint).copied().unwrap_or(0)
    }

    /// Make an endpoint answer with a 500 until `recover` is called
    pub fn fail(&self, endpoint: &'static str) {
        self.state.lock().failing.insert(endpoint);
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.state.lock().failing.remove(endpoint);
    }

    /// Hold every later request to `endpoint` after it has read its data
    pub fn hold(&self, endpoint: &'static str) {
        self.gates.lock().insert(endpoint, Arc::new(Gate::new()));
    }

    /// Let one held request through
    pub fn release(&self, endpoint: &'static str) {
        if let Some(gate) = self.gates.lock().get(endpoint) {
            gate.permits.add_permits(1);
        }
    }

    /// Stop holding, and let everything waiting through
    pub fn open(&self, endpoint: &'static str) {
        if let Some(gate) = self.gates.lock().remove(endpoint) {
            gate.permits.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Wait until `count` requests have reached the gate on `endpoint`
    pub async fn arrived(&self, endpoint: &'static str, count: usize) {
        let gate = match self.gates.lock().get(endpoint) {
            Some(g) => g.clone(),
            None => panic!("{} is not held", endpoint),
        };
        tokio::time::timeout(WAIT, async {
            loop {
                let notified = gate.arrived_notify.notified();
                if *gate.arrived.lock() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("request never arrived");
    }

    // Count the call, read the answer, then wait at the gate if there is one
    async fn answer<T>(
        &self,
        endpoint: &'static str,
        read: impl FnOnce(&mut State) -> T,
    ) -> Result<T, Error> {
        let answer = {
            let mut state = self.state.lock();
            *state.calls.entry(endpoint).or_insert(0) += 1;
            if state.failing.contains(endpoint) {
                None
            } else {
                Some(read(&mut state))
            }
        };

        let gate = self.gates.lock().get(endpoint).cloned();
        if let Some(gate) = gate {
            *gate.arrived.lock() += 1;
            gate.arrived_notify.notify_waiters();
            let permit = gate.permits.acquire().await.unwrap();
            permit.forget();
        }

        match answer {
            Some(answer) => Ok(answer),
            None => Err(ErrorKind::Service {
                status: 500,
                detail: "Internal Server Error".to_owned(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl Service for FakeNode {
    async fn timeline(&self) -> Result<Vec<Post>, Error> {
        self.answer("timeline", |s| s.posts.clone()).await
    }

    async fn own_identity(&self) -> Result<OwnIdentity, Error> {
        self.answer("pubkey", |_| OwnIdentity { pubkey: pk(OWN_KEY) })
            .await
    }

    async fn subscriptions(&self) -> Result<Vec<SubscriptionRecord>, Error> {
        self.answer("subscriptions", |s| s.subscriptions.clone())
            .await
    }

    async fn subscribed(&self) -> Result<Vec<SubscriberRecord>, Error> {
        self.answer("subscribed", |s| s.subscribed.clone()).await
    }

    async fn subscribe(&self, pubkey: &PublicKey, alias: &str) -> Result<Detail, Error> {
        let detail = self
            .answer("subscribe", |s| {
                if s.subscriptions.iter().any(|r| &r.pubkey == pubkey) {
                    "Already subscribed".to_owned()
                } else {
                    s.subscriptions.push(SubscriptionRecord {
                        pubkey: pubkey.clone(),
                        alias: alias.to_owned(),
                    });
                    format!("Subscribed to {}", pubkey)
                }
            })
            .await?;
        Ok(Detail { detail })
    }

    async fn unsubscribe(&self, pubkey: &PublicKey) -> Result<Detail, Error> {
        let detail = self
            .answer("unsubscribe", |s| {
                let before = s.subscriptions.len();
                s.subscriptions.retain(|r| &r.pubkey != pubkey);
                if s.subscriptions.len() < before {
                    format!("Unsubscribed from {}", pubkey)
                } else {
                    "Not subscribed".to_owned()
                }
            })
            .await?;
        Ok(Detail { detail })
    }

    async fn post(&self, post: &NewPost) -> Result<(), Error> {
        let text = post.text.clone();
        let len = self.state.lock().posts.len();
        let new_post: Post = serde_json::from_value(serde_json::json!({
            "id": len,
            "text": text,
            "timestamp": 1670706509,
            "author_alias": "",
            "author": OWN_KEY,
        }))
        .unwrap();
        self.answer("post", move |s| s.posts.push(new_post)).await
    }
}
