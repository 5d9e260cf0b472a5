use crate::people::{SubscriberRecord, SubscriptionRecord};
use crate::pubkey::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// When a subscription record counts as a match for a follower.
///
/// Nodes let you follow someone with an empty alias. Whether such a
/// follower should be shown as mutual is a policy choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AliasMatch {
    /// Only a subscription with a non-empty alias matches. A mutual
    /// follower whose alias is empty shows as alias-less.
    #[default]
    RequireAlias,

    /// Any subscription with the same key matches, whatever its alias
    AnyMatch,
}

impl AliasMatch {
    fn accepts(&self, record: &SubscriptionRecord) -> bool {
        match self {
            AliasMatch::RequireAlias => !record.alias.is_empty(),
            AliasMatch::AnyMatch => true,
        }
    }
}

/// A follower, annotated with our alias for them if we follow them back
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Follower {
    pub pubkey: PublicKey,
    pub alias: Option<String>,
}

impl Follower {
    pub fn is_mutual(&self) -> bool {
        self.alias.is_some()
    }
}

/// Annotate each follower with the alias from our subscriptions.
///
/// Output follows the order of `subscribed`. Neither input is changed.
pub fn reconcile_followers(
    subscriptions: &[SubscriptionRecord],
    subscribed: &[SubscriberRecord],
    policy: AliasMatch,
) -> Vec<Follower> {
    subscribed
        .iter()
        .map(|s| Follower {
            pubkey: s.pubkey.clone(),
            alias: alias_for(subscriptions, &s.pubkey, policy),
        })
        .collect()
}

/// Our alias for any key, if we follow it
pub fn alias_for(
    subscriptions: &[SubscriptionRecord],
    pubkey: &PublicKey,
    policy: AliasMatch,
) -> Option<String> {
    // First record for a key wins, the same one `following` keeps
    subscriptions
        .iter()
        .find(|r| &r.pubkey == pubkey)
        .filter(|r| policy.accepts(r))
        .map(|r| r.alias.clone())
}

/// The people we follow, one record per key, in service order
pub fn following(subscriptions: &[SubscriptionRecord]) -> Vec<SubscriptionRecord> {
    let mut seen: HashSet<&PublicKey> = HashSet::new();
    subscriptions
        .iter()
        .filter(|r| seen.insert(&r.pubkey))
        .cloned()
        .collect()
}
