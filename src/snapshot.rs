use crate::comms::Resource;
use crate::followers::{self, AliasMatch, Follower};
use crate::people::{FollowState, OwnIdentity, Pending, SubscriberRecord, SubscriptionRecord};
use crate::post::Post;
use crate::pubkey::PublicKey;

/// How one resource's fetches have gone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    /// Sequence number of the response currently shown. Zero until the
    /// first success.
    pub applied_seq: u64,

    /// How many responses (good or bad) have come back
    pub settled: u64,

    /// Error from the latest response, if it failed. The data is left as it
    /// was before that response.
    pub last_error: Option<String>,
}

impl ResourceStatus {
    pub fn is_loaded(&self) -> bool {
        self.applied_seq > 0
    }
}

/// What we last heard from the node. Each collection is replaced whole by
/// the latest successful fetch of it, independently of the others.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub posts: Vec<Post>,
    pub own_identity: Option<OwnIdentity>,
    pub subscriptions: Vec<SubscriptionRecord>,
    pub subscribed: Vec<SubscriberRecord>,
    statuses: [ResourceStatus; 4],
}

/// A successful fetch, ready to replace one collection
#[derive(Debug)]
pub(crate) enum Fetched {
    Timeline(Vec<Post>),
    OwnIdentity(OwnIdentity),
    Subscriptions(Vec<SubscriptionRecord>),
    Subscribed(Vec<SubscriberRecord>),
}

impl Fetched {
    pub(crate) fn resource(&self) -> Resource {
        match self {
            Fetched::Timeline(_) => Resource::Timeline,
            Fetched::OwnIdentity(_) => Resource::OwnIdentity,
            Fetched::Subscriptions(_) => Resource::Subscriptions,
            Fetched::Subscribed(_) => Resource::Subscribed,
        }
    }
}

impl Snapshot {
    pub fn status(&self, resource: Resource) -> &ResourceStatus {
        &self.statuses[resource.index()]
    }

    /// Whether every resource has loaded at least once
    pub fn is_complete(&self) -> bool {
        self.statuses.iter().all(|s| s.is_loaded())
    }

    /// Resources whose latest fetch failed
    pub fn failing(&self) -> Vec<Resource> {
        Resource::ALL
            .into_iter()
            .filter(|r| self.status(*r).last_error.is_some())
            .collect()
    }

    pub fn own_pubkey(&self) -> Option<&PublicKey> {
        self.own_identity.as_ref().map(|o| &o.pubkey)
    }

    /// Our followers, with our alias for those we follow back
    pub fn followers(&self, policy: AliasMatch) -> Vec<Follower> {
        followers::reconcile_followers(&self.subscriptions, &self.subscribed, policy)
    }

    /// Who we follow, one record per key
    pub fn following(&self) -> Vec<SubscriptionRecord> {
        followers::following(&self.subscriptions)
    }

    pub fn alias_for(&self, pubkey: &PublicKey, policy: AliasMatch) -> Option<String> {
        followers::alias_for(&self.subscriptions, pubkey, policy)
    }

    pub fn follow_state(&self, pubkey: &PublicKey, pending: &Pending) -> FollowState {
        pending.follow_state(pubkey, &self.subscriptions)
    }

    pub(crate) fn apply(&mut self, seq: u64, fetched: Fetched) {
        let status = &mut self.statuses[fetched.resource().index()];
        status.applied_seq = seq;
        status.settled += 1;
        status.last_error = None;

        match fetched {
            Fetched::Timeline(posts) => self.posts = posts,
            Fetched::OwnIdentity(own) => self.own_identity = Some(own),
            Fetched::Subscriptions(subs) => self.subscriptions = subs,
            Fetched::Subscribed(subs) => self.subscribed = subs,
        }
    }

    pub(crate) fn fail(&mut self, resource: Resource, error: String) {
        let status = &mut self.statuses[resource.index()];
        status.settled += 1;
        status.last_error = Some(error);
    }

    /// A response that lost the race to a newer one. It settles but
    /// changes nothing.
    pub(crate) fn discard(&mut self, resource: Resource) {
        self.statuses[resource.index()].settled += 1;
    }
}
