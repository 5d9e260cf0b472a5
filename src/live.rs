use murmur::date_ago::unix_now;
use murmur::{
    AliasMatch, Error, Level, Notifications, Session, Settings, Snapshot,
    ToOverlordMessage,
};
use std::fmt::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const TIMELINE_LEN: usize = 20;

const LIVE_HELP: &str = "\
Type a line to post it, or:
  /follow <pubkey> [<alias>]
  /unfollow <pubkey>
  /scan <payload>
  /refresh
  /dismiss
  /quit";

/// The live view: redraw whenever the snapshot or the notifications
/// change, and read commands from stdin until told to quit.
pub async fn run(settings: Settings) -> Result<(), Error> {
    let policy = settings.alias_match;
    let session = Session::start(settings)?;
    let mut snapshots = session.syncer.subscribe();
    let mut notes = session.notifications.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_drawn = String::new();

    println!("{}", LIVE_HELP);

    loop {
        let view = render(&session.syncer.snapshot(), &session.notifications, policy);
        if view != last_drawn {
            println!("{}", view);
            last_drawn = view;
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            },
            _ = notes.changed() => {},
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&session, line.trim())? {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("{}", e);
                        break;
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown().await
}

// Returns false when the user wants out
fn handle_line(session: &Session, line: &str) -> Result<bool, Error> {
    if line.is_empty() {
        return Ok(true);
    }

    let message = if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("quit"), _, _) => return Ok(false),
            (Some("refresh"), _, _) => ToOverlordMessage::ResyncAll,
            (Some("dismiss"), _, _) => {
                session.notifications.dismiss_all();
                return Ok(true);
            }
            (Some("follow"), Some(pubkey), alias) => ToOverlordMessage::Follow {
                pubkey: pubkey.to_owned(),
                alias: alias.unwrap_or("").trim().to_owned(),
            },
            (Some("unfollow"), Some(pubkey), _) => ToOverlordMessage::Unfollow(pubkey.to_owned()),
            (Some("scan"), Some(payload), _) => ToOverlordMessage::FollowScanned(payload.to_owned()),
            _ => {
                println!("{}", LIVE_HELP);
                return Ok(true);
            }
        }
    } else {
        ToOverlordMessage::Post(line.to_owned())
    };

    session.to_overlord.send(message)?;
    Ok(true)
}

fn render(snapshot: &Snapshot, notifications: &Notifications, policy: AliasMatch) -> String {
    let mut out = String::new();
    let now = unix_now();

    let _ = writeln!(out, "=====");
    match snapshot.own_pubkey() {
        Some(pk) => {
            let _ = writeln!(out, "You are {}", pk.abbreviated());
        }
        None => {
            let _ = writeln!(out, "Connecting...");
        }
    }

    let _ = writeln!(out, "\nTimeline");
    for post in snapshot.posts.iter().rev().take(TIMELINE_LEN).rev() {
        let author = if post.author_alias.is_empty() {
            post.author.abbreviated()
        } else {
            post.author_alias.clone()
        };
        let age = post.age(now).unwrap_or_default();
        let _ = writeln!(out, "  [{}] {}: {}", age, author, post.text);
    }

    let _ = writeln!(out, "\nFollowing");
    for sub in snapshot.following() {
        let _ = writeln!(out, "  {} {}", sub.pubkey.abbreviated(), sub.alias);
    }

    let _ = writeln!(out, "\nFollowers");
    for follower in snapshot.followers(policy) {
        match &follower.alias {
            Some(alias) => {
                let _ = writeln!(out, "  {} {} (mutual)", follower.pubkey.abbreviated(), alias);
            }
            None => {
                let _ = writeln!(out, "  {}", follower.pubkey.abbreviated());
            }
        }
    }

    for resource in snapshot.failing() {
        let _ = writeln!(out, "\n(showing old {}, refresh is failing)", resource);
    }

    let notes = notifications.read_all();
    if !notes.is_empty() {
        let _ = writeln!(out);
        for note in notes {
            let tag = match note.level {
                Level::Info => "info",
                Level::Error => "error",
            };
            let _ = writeln!(out, "[{}] {}", tag, note.message);
        }
    }

    out
}
