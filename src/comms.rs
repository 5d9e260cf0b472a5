use tokio::sync::oneshot;

/// This is a message sent to the Overlord. There is no return value; the
/// outcome shows up in the notifications and, after a resync, in the
/// snapshots. Synchronous front ends engage the Overlord this way.
#[derive(Debug, Clone)]
pub enum ToOverlordMessage {
    /// Calls [follow](crate::Overlord::follow)
    Follow { pubkey: String, alias: String },

    /// Calls [follow_scanned](crate::Overlord::follow_scanned)
    FollowScanned(String),

    /// Calls [unfollow](crate::Overlord::unfollow)
    Unfollow(String),

    /// Calls [post](crate::Overlord::post)
    Post(String),

    /// Refetch everything now rather than at the next tick
    ResyncAll,

    Shutdown,
}

/// The four things the Syncer keeps fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Timeline,
    OwnIdentity,
    Subscriptions,
    Subscribed,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Timeline,
        Resource::OwnIdentity,
        Resource::Subscriptions,
        Resource::Subscribed,
    ];

    /// What follow and unfollow can change
    pub const PEOPLE: [Resource; 2] = [Resource::Subscriptions, Resource::Subscribed];

    pub fn index(&self) -> usize {
        match self {
            Resource::Timeline => 0,
            Resource::OwnIdentity => 1,
            Resource::Subscriptions => 2,
            Resource::Subscribed => 3,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Resource::Timeline => "timeline",
            Resource::OwnIdentity => "pubkey",
            Resource::Subscriptions => "subscriptions",
            Resource::Subscribed => "subscribed",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}

/// This is a message sent to the Syncer
#[derive(Debug)]
pub(crate) enum ToSyncerMessage {
    /// Fetch these now. If a sender is given, it fires once a response to
    /// a request issued after this message has settled for each of them.
    Resync(Vec<Resource>, Option<oneshot::Sender<()>>),
}
