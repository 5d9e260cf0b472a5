use crate::date_ago::{date_ago, format_date};
use crate::error::{Error, ErrorKind};
use crate::pubkey::PublicKey;
use serde::{Deserialize, Serialize};

/// A post as shown in the feed.
///
/// Posts have no stable identity on our side: the feed is replaced whole on
/// every poll and shown in the order the service returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "WirePost")]
pub struct Post {
    pub author: PublicKey,
    pub author_alias: String,
    pub text: String,
    pub formatted_date: String,

    /// Seconds since the epoch, if the service sent it
    pub timestamp: Option<f64>,

    /// The service's own post number, if any. Not unique across authors.
    pub id: Option<i64>,
}

impl Post {
    /// Relative age of the post, if we know when it was made
    pub fn age(&self, now: i64) -> Option<String> {
        self.timestamp.map(|t| date_ago(t.floor() as i64, now))
    }
}

// What the timeline endpoint sends. Nodes send either a preformatted date
// or a raw timestamp.
#[derive(Deserialize)]
struct WirePost {
    author: PublicKey,
    #[serde(default)]
    author_alias: String,
    text: String,
    #[serde(default)]
    formatted_date: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    id: Option<i64>,
}

impl From<WirePost> for Post {
    fn from(w: WirePost) -> Post {
        let formatted_date = match (w.formatted_date, w.timestamp) {
            (Some(date), _) => date,
            (None, Some(ts)) => format_date(ts),
            (None, None) => String::new(),
        };
        Post {
            author: w.author,
            author_alias: w.author_alias,
            text: w.text,
            formatted_date,
            timestamp: w.timestamp,
            id: w.id,
        }
    }
}

/// Body of a post submission: `{ "text": "..." }`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewPost {
    pub text: String,
}

impl NewPost {
    /// Blank posts are refused before anything goes on the wire
    pub fn new(text: &str) -> Result<NewPost, Error> {
        if text.trim().is_empty() {
            return Err(ErrorKind::EmptyPost.into());
        }
        Ok(NewPost {
            text: text.to_owned(),
        })
    }
}
