#![cfg_attr(not(debug_assertions), windows_subsystem = "console")]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

mod commands;
mod live;

use murmur::{Error, Settings};
use std::env;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn main() -> Result<(), Error> {
    // Setup logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    let env_filter = EnvFilter::from_default_env();
    let max_level = match env_filter.max_level_hint() {
        Some(l) => l,
        None => LevelFilter::ERROR,
    };
    let show_debug = cfg!(debug_assertions) || max_level <= LevelFilter::DEBUG;
    tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_file(show_debug)
        .with_line_number(show_debug)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    // Setup async
    let rt = tokio::runtime::Runtime::new()?;
    let _main_rt = rt.enter();

    // If we were handed a command, execute the command and return
    let args = env::args();
    if args.len() > 1 {
        match commands::handle_command(args, &rt) {
            Err(e) => {
                println!("{}", e.user_message());
                return Ok(());
            }
            Ok(exit) => {
                if exit {
                    return Ok(());
                }
            }
        }
    }

    let settings = Settings::load()?;
    if let Err(e) = rt.block_on(live::run(settings)) {
        tracing::error!("{}", e);
    }

    Ok(())
}
