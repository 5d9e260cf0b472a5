use crate::pubkey::PublicKey;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Someone we follow, with the alias we gave them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub pubkey: PublicKey,
    #[serde(default)]
    pub alias: String,
}

/// Someone who follows us. They carry no alias of their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub pubkey: PublicKey,
}

/// The identity of the node we are a client of
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnIdentity {
    pub pubkey: PublicKey,
}

/// Where our relationship with a key stands, from our side
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowState {
    NotFollowing,
    Pending(PendingAction),
    Following,
}

/// A follow or unfollow request that has been sent but not answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Follow,
    Unfollow,
}

/// Follow requests in flight.
///
/// This never predicts the outcome of a request. Once a request settles its
/// entry is removed and the relationship is read from the subscriptions the
/// service reports.
#[derive(Debug, Default)]
pub struct Pending {
    actions: DashMap<PublicKey, PendingAction>,
}

impl Pending {
    pub fn new() -> Pending {
        Pending::default()
    }

    /// Claim the key for an action. Returns false if some action is
    /// already outstanding for it.
    pub fn begin(&self, pubkey: &PublicKey, action: PendingAction) -> bool {
        match self.actions.entry(pubkey.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(action);
                true
            }
        }
    }

    pub fn finish(&self, pubkey: &PublicKey) {
        self.actions.remove(pubkey);
    }

    pub fn get(&self, pubkey: &PublicKey) -> Option<PendingAction> {
        self.actions.get(pubkey).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Combine what is in flight with what the service last told us
    pub fn follow_state(
        &self,
        pubkey: &PublicKey,
        subscriptions: &[SubscriptionRecord],
    ) -> FollowState {
        if let Some(action) = self.get(pubkey) {
            return FollowState::Pending(action);
        }
        if subscriptions.iter().any(|s| &s.pubkey == pubkey) {
            FollowState::Following
        } else {
            FollowState::NotFollowing
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pk(s: &str) -> PublicKey {
        PublicKey::try_from_str(s).unwrap()
    }

    #[test]
    fn test_follow_state_lifecycle() {
        let pending = Pending::new();
        let xyz = pk("xyz");
        let mut subs: Vec<SubscriptionRecord> = vec![];

        assert_eq!(pending.follow_state(&xyz, &subs), FollowState::NotFollowing);

        assert!(pending.begin(&xyz, PendingAction::Follow));
        assert!(!pending.begin(&xyz, PendingAction::Unfollow));
        assert_eq!(
            pending.follow_state(&xyz, &subs),
            FollowState::Pending(PendingAction::Follow)
        );

        // The refetched lists land while the key is still pending
        subs.push(SubscriptionRecord {
            pubkey: xyz.clone(),
            alias: "carol".to_owned(),
        });
        assert_eq!(
            pending.follow_state(&xyz, &subs),
            FollowState::Pending(PendingAction::Follow)
        );
        pending.finish(&xyz);
        assert_eq!(pending.follow_state(&xyz, &subs), FollowState::Following);

        assert!(pending.begin(&xyz, PendingAction::Unfollow));
        assert_eq!(
            pending.follow_state(&xyz, &subs),
            FollowState::Pending(PendingAction::Unfollow)
        );
        subs.clear();
        pending.finish(&xyz);
        assert_eq!(pending.follow_state(&xyz, &subs), FollowState::NotFollowing);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_records_parse() {
        let subs: Vec<SubscriptionRecord> =
            serde_json::from_str(r#"[{"pubkey":"abc","alias":"bob"},{"pubkey":"def"}]"#).unwrap();
        assert_eq!(subs[0].alias, "bob");
        assert_eq!(subs[1].alias, "");

        let followers: Vec<SubscriberRecord> =
            serde_json::from_str(r#"[{"pubkey":"abc"}]"#).unwrap();
        assert_eq!(followers[0].pubkey.as_str(), "abc");

        let own: OwnIdentity = serde_json::from_str(r#"{"pubkey":"me"}"#).unwrap();
        assert_eq!(own.pubkey.as_str(), "me");
    }
}
