use crate::error::Error;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage paths
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    /// The base directory for all murmur data
    pub base_dir: PathBuf,

    /// The settings file within the base directory
    pub settings_file: PathBuf,
}

impl Profile {
    /// Locate (and create if missing) the profile directory.
    ///
    /// `MURMUR_DIR` overrides the system data directory.
    pub fn current() -> Result<Profile, Error> {
        let base_dir = match env::var("MURMUR_DIR") {
            Ok(dir) => {
                tracing::info!("Using MURMUR_DIR: {}", dir);
                PathBuf::from(dir)
            }
            Err(_) => {
                let mut base_dir = dirs::data_dir()
                    .ok_or::<Error>("Cannot find a directory to store application data.".into())?;
                base_dir.push("murmur");
                base_dir
            }
        };

        Profile::in_dir(base_dir)
    }

    /// A profile rooted at the given directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Profile, Error> {
        let base_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        // Canonicalize (follow symlinks, resolve ".." paths)
        let base_dir = fs::canonicalize(&base_dir).unwrap_or(base_dir);

        let settings_file = {
            let mut settings_file = base_dir.clone();
            settings_file.push("settings.json");
            settings_file
        };

        Ok(Profile {
            base_dir,
            settings_file,
        })
    }
}
