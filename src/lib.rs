#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

//! A client for a small social node: it keeps a local view of the node's
//! timeline and follow graph fresh, and carries out follows, unfollows and
//! posts on the user's behalf.

pub mod comms;
pub mod date_ago;
pub mod error;
pub mod fetcher;
pub mod followers;
pub mod overlord;
pub mod people;
pub mod post;
pub mod profile;
pub mod pubkey;
pub mod qr;
pub mod service;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod status;
pub mod syncer;

#[macro_use]
extern crate lazy_static;

pub use comms::{Resource, ToOverlordMessage};
pub use error::{Error, ErrorKind};
pub use fetcher::Fetcher;
pub use followers::{AliasMatch, Follower};
pub use overlord::Overlord;
pub use people::{FollowState, PendingAction};
pub use post::{NewPost, Post};
pub use pubkey::PublicKey;
pub use service::{Detail, Service};
pub use session::Session;
pub use settings::Settings;
pub use snapshot::Snapshot;
pub use status::{Level, Notification, Notifications};
pub use syncer::{SyncHandle, Syncer};

pub static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The state that the engine is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Online,
    ShuttingDown,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Initializing => write!(f, "Initializing"),
            RunState::Online => write!(f, "Online"),
            RunState::ShuttingDown => write!(f, "Shutting Down"),
        }
    }
}
