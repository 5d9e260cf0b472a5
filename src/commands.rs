use murmur::date_ago::unix_now;
use murmur::settings::{parse_origin, MIN_POLL_INTERVAL_MS};
use murmur::{qr, Error, ErrorKind, Resource, Session, Settings, Snapshot};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct Command {
    cmd: &'static str,
    usage_params: &'static str,
    desc: &'static str,
}

impl Command {
    fn usage(&self, msg: String) -> Result<(), Error> {
        Err(ErrorKind::Usage(msg, format!("murmur {} {}", self.cmd, self.usage_params)).into())
    }
}

const COMMANDS: [Command; 13] = [
    Command {
        cmd: "follow",
        usage_params: "<pubkey> [<alias>]",
        desc: "follow the given key, optionally under an alias",
    },
    Command {
        cmd: "followers",
        usage_params: "",
        desc: "print everyone who follows you, with your alias for those you follow back",
    },
    Command {
        cmd: "following",
        usage_params: "",
        desc: "print everyone you follow",
    },
    Command {
        cmd: "help",
        usage_params: "<command>",
        desc: "show this list",
    },
    Command {
        cmd: "post",
        usage_params: "<text>",
        desc: "publish a post. All remaining arguments are joined with spaces.",
    },
    Command {
        cmd: "print_settings",
        usage_params: "",
        desc: "print the current settings as JSON",
    },
    Command {
        cmd: "qr",
        usage_params: "[<png_path>]",
        desc: "show your key as a QR code, or save it as a PNG",
    },
    Command {
        cmd: "scan",
        usage_params: "<payload>",
        desc: "follow the key carried by a scanned QR code",
    },
    Command {
        cmd: "set_interval",
        usage_params: "<milliseconds>",
        desc: "set how often the node is polled",
    },
    Command {
        cmd: "set_origin",
        usage_params: "<url>",
        desc: "set where the node's service lives",
    },
    Command {
        cmd: "timeline",
        usage_params: "",
        desc: "print the timeline",
    },
    Command {
        cmd: "unfollow",
        usage_params: "<pubkey>",
        desc: "stop following the given key",
    },
    Command {
        cmd: "whoami",
        usage_params: "",
        desc: "print your own key",
    },
];

pub fn handle_command(mut args: env::Args, rt: &Runtime) -> Result<bool, Error> {
    let _ = args.next(); // program name
    let command_string = match args.next() {
        Some(s) => s,
        None => return Ok(false),
    };

    let mut command: Option<Command> = None;
    for c in COMMANDS.iter() {
        if command_string == c.cmd {
            command = Some(c.to_owned());
            break;
        }
    }
    let command = match command {
        None => return Err(ErrorKind::UnknownCommand(command_string).into()),
        Some(c) => c,
    };

    match command.cmd {
        "follow" => follow(command, args, rt)?,
        "followers" => followers(rt)?,
        "following" => following(rt)?,
        "help" => help(command, args)?,
        "post" => post(command, args, rt)?,
        "print_settings" => print_settings()?,
        "qr" => show_qr(args, rt)?,
        "scan" => scan(command, args, rt)?,
        "set_interval" => set_interval(command, args)?,
        "set_origin" => set_origin(command, args)?,
        "timeline" => timeline(rt)?,
        "unfollow" => unfollow(command, args, rt)?,
        "whoami" => whoami(rt)?,
        other => println!("Unknown command {}", other),
    }

    Ok(true)
}

pub fn help(_cmd: Command, mut args: env::Args) -> Result<(), Error> {
    if let Some(sub) = args.next() {
        for c in COMMANDS.iter() {
            if sub == c.cmd {
                println!("murmur {} {}", c.cmd, c.usage_params);
                println!("    {}", c.desc);
                return Ok(());
            }
        }
        println!("No such command {}", sub);
    } else {
        println!("murmur with no command starts the live view.");
        for c in COMMANDS.iter() {
            println!("  {} {}", c.cmd, c.usage_params);
        }
    }
    Ok(())
}

// Start a session, wait for one round of the given resources, and stop
fn load(rt: &Runtime, resources: &[Resource]) -> Result<Arc<Snapshot>, Error> {
    let settings = Settings::load()?;
    let timeout = Duration::from_secs(settings.request_timeout_sec + settings.connect_timeout_sec);

    let snapshot = rt.block_on(async {
        let session = Session::start(settings)?;
        let waited = session
            .syncer
            .wait_until(timeout, |s| {
                resources.iter().all(|r| s.status(*r).settled > 0)
            })
            .await;
        session.shutdown().await?;
        waited
    })?;

    for resource in resources {
        if let Some(e) = &snapshot.status(*resource).last_error {
            return Err(ErrorKind::General(format!("Could not load {}: {}", resource, e)).into());
        }
    }
    Ok(snapshot)
}

pub fn timeline(rt: &Runtime) -> Result<(), Error> {
    let snapshot = load(rt, &[Resource::Timeline])?;
    let now = unix_now();
    for post in &snapshot.posts {
        let author = if post.author_alias.is_empty() {
            post.author.abbreviated()
        } else {
            post.author_alias.clone()
        };
        match post.age(now) {
            Some(age) => println!("{} ({} ago) {}", post.formatted_date, age, author),
            None => println!("{} {}", post.formatted_date, author),
        }
        println!("    {}", post.text);
    }
    Ok(())
}

pub fn following(rt: &Runtime) -> Result<(), Error> {
    let snapshot = load(rt, &[Resource::Subscriptions])?;
    for sub in snapshot.following() {
        println!("{} {}", sub.pubkey, sub.alias);
    }
    Ok(())
}

pub fn followers(rt: &Runtime) -> Result<(), Error> {
    let policy = Settings::load()?.alias_match;
    let snapshot = load(rt, &Resource::PEOPLE)?;
    for follower in snapshot.followers(policy) {
        match &follower.alias {
            Some(alias) => println!("{} {} (mutual)", follower.pubkey, alias),
            None => println!("{}", follower.pubkey),
        }
    }
    Ok(())
}

pub fn whoami(rt: &Runtime) -> Result<(), Error> {
    let snapshot = load(rt, &[Resource::OwnIdentity])?;
    if let Some(pubkey) = snapshot.own_pubkey() {
        println!("{}", pubkey);
    }
    Ok(())
}

pub fn show_qr(mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let snapshot = load(rt, &[Resource::OwnIdentity])?;
    let pubkey = match snapshot.own_pubkey() {
        Some(pk) => pk,
        None => return Err("The node did not report a key".into()),
    };

    match args.next() {
        Some(path) => {
            let path = PathBuf::from(path);
            qr::save_png(pubkey, &path)?;
            println!("Saved {}", path.display());
        }
        None => {
            println!("{}", qr::render_terminal(pubkey)?);
            println!("{}", pubkey);
        }
    }
    Ok(())
}

pub fn follow(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let pubkey = match args.next() {
        Some(s) => s,
        None => return cmd.usage("Missing pubkey parameter".to_string()),
    };
    let alias = args.next().unwrap_or_default();

    let settings = Settings::load()?;
    let detail = rt.block_on(async {
        let session = Session::start(settings)?;
        let result = session.overlord.follow(&pubkey, &alias).await;
        session.shutdown().await?;
        result
    })?;
    println!("{}", detail.detail);
    Ok(())
}

pub fn scan(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let payload = match args.next() {
        Some(s) => s,
        None => return cmd.usage("Missing payload parameter".to_string()),
    };

    let settings = Settings::load()?;
    let detail = rt.block_on(async {
        let session = Session::start(settings)?;
        let result = session.overlord.follow_scanned(&payload).await;
        session.shutdown().await?;
        result
    })?;
    println!("{}", detail.detail);
    Ok(())
}

pub fn unfollow(cmd: Command, mut args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let pubkey = match args.next() {
        Some(s) => s,
        None => return cmd.usage("Missing pubkey parameter".to_string()),
    };

    let settings = Settings::load()?;
    let detail = rt.block_on(async {
        let session = Session::start(settings)?;
        let result = session.overlord.unfollow(&pubkey).await;
        session.shutdown().await?;
        result
    })?;
    println!("{}", detail.detail);
    Ok(())
}

pub fn post(cmd: Command, args: env::Args, rt: &Runtime) -> Result<(), Error> {
    let text = args.collect::<Vec<String>>().join(" ");
    if text.trim().is_empty() {
        return cmd.usage("Missing text".to_string());
    }

    let settings = Settings::load()?;
    rt.block_on(async {
        let session = Session::start(settings)?;
        let result = session.overlord.post(&text).await;
        session.shutdown().await?;
        result
    })?;
    println!("Posted");
    Ok(())
}

pub fn set_origin(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let origin = match args.next() {
        Some(s) => parse_origin(&s)?,
        None => return cmd.usage("Missing url parameter".to_string()),
    };

    let mut settings = Settings::load()?;
    settings.origin = origin.to_string();
    settings.save()?;
    println!("Origin set to {}", settings.origin);
    Ok(())
}

pub fn set_interval(cmd: Command, mut args: env::Args) -> Result<(), Error> {
    let ms = match args.next() {
        Some(s) => match s.parse::<u64>() {
            Ok(ms) => ms,
            Err(_) => return cmd.usage(format!("Not a number: {}", s)),
        },
        None => return cmd.usage("Missing milliseconds parameter".to_string()),
    };
    if ms < MIN_POLL_INTERVAL_MS {
        return cmd.usage(format!("Interval must be at least {}ms", MIN_POLL_INTERVAL_MS));
    }

    let mut settings = Settings::load()?;
    settings.poll_interval_ms = ms;
    settings.save()?;
    println!("Polling every {}ms", ms);
    Ok(())
}

pub fn print_settings() -> Result<(), Error> {
    let settings = Settings::load()?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
