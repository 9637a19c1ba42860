//! Configuration file handling for revisor.
//!
//! Looks for `.config/revisor.toml` in the current directory or any parent
//! directory. `REVISOR_*` environment variables override the file; command
//! line flags override both.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use revisor::{Dialect, GroupSpec, Options};
use serde::Deserialize;

pub const CONFIG_FILE: &str = ".config/revisor.toml";

/// Everything that can be set from the file or the environment.
#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub dialect: Option<String>,
    pub user_variable: Option<String>,
    /// Groups used when none are given on the command line.
    pub groups: Vec<String>,
}

impl Settings {
    /// Synthesis options, with `dialect` and `user_variable` from the command
    /// line taking precedence.
    pub fn options(
        &self,
        dialect: Option<Dialect>,
        user_variable: Option<String>,
    ) -> Result<Options, String> {
        let mut options = Options::default();

        if let Some(dialect) = dialect {
            options = options.dialect(dialect);
        } else if let Some(dialect) = &self.dialect {
            options = options.dialect(dialect.parse()?);
        }

        if let Some(name) = user_variable.or_else(|| self.user_variable.clone()) {
            options = options.user_variable(name.trim_start_matches('@'));
        }

        Ok(options)
    }

    pub fn groups(&self) -> Result<Vec<GroupSpec>, revisor::Error> {
        self.groups.iter().map(|g| g.parse()).collect()
    }
}

/// Load settings. An explicit path must exist; otherwise the nearest
/// `.config/revisor.toml` is used if there is one.
pub fn load(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>), ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().map_err(|e| ConfigError::Foreign(Box::new(e)))?;
            find_config_file(&cwd)
        }
    };

    let settings = build(path.as_deref(), environment())?;
    Ok((settings, path))
}

/// Find `.config/revisor.toml` by searching up the directory tree.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.is_file() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("REVISOR")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("groups")
}

fn build(path: Option<&Path>, env: Environment) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }
    builder.add_source(env).build()?.try_deserialize()
}
