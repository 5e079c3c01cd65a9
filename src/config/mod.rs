//! Configuration for the program.

/// Configuration for the program, read from a TOML file.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chat messages are only treated as commands when they start with this.
    pub command_prefix: String,

    /// Where the registered games are persisted.
    pub registry_path: std::path::PathBuf,

    /// Chat user ID of the only user allowed to run commands that control
    /// processes or modify the registry. When unset, the owners of the bot's
    /// chat application are.
    pub owner_id: Option<u64>,

    pub log_level: String,

    /// Whether pressing keys is an owner-only command.
    pub restrict_press_key: bool,

    pub delays: Delays,

    /// The game targeted by the restart-and-log-in sequence, if any.
    pub login_target: Option<LoginTarget>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            command_prefix: crate::constants::DEFAULT_COMMAND_PREFIX.into(),
            registry_path: crate::constants::DEFAULT_REGISTRY_PATH.into(),
            owner_id: None,
            log_level: "info".into(),
            restrict_press_key: false,
            delays: Delays::default(),
            login_target: None,
        };
    }
}

/// Fixed waits between the steps of multi-step commands, in seconds.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Delays {
    /// Between stopping and starting a game on restart.
    pub restart_settle_secs: u64,

    /// Between stopping and launching the login target.
    pub login_settle_secs: u64,

    /// Between launching the login target and the first key press. Stands in
    /// for a readiness signal the game does not give: if the game starts
    /// slower than this, the key presses miss the login prompt.
    pub login_startup_secs: u64,

    /// Between consecutive key presses of the login sequence.
    pub login_key_interval_secs: u64,
}

impl Default for Delays {
    fn default() -> Self {
        return Self {
            restart_settle_secs: 3,
            login_settle_secs: 2,
            login_startup_secs: 60,
            login_key_interval_secs: 1,
        };
    }
}

/// A game that needs some key presses after startup to get to its login
/// prompt, e.g. for showing a QR code.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoginTarget {
    /// Display name used in chat responses.
    pub name: String,
    pub app_id: String,
    pub process_name: String,
    #[serde(default = "LoginTarget::default_keys")]
    pub keys: Vec<crate::input::Key>,
}

impl LoginTarget {
    fn default_keys() -> Vec<crate::input::Key> {
        return vec![crate::input::Key::Enter, crate::input::Key::Enter];
    }
}

#[derive(Debug)]
pub enum Error {
    Read(std::path::PathBuf, std::io::Error),
    Parse(std::path::PathBuf, toml::de::Error),
    Invalid(String),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read(_, err) => Some(err),
            Error::Parse(_, err) => Some(err),
            Error::Invalid(_) => None,
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Read(path, _) => write!(f, "cannot read config file {}", path.to_string_lossy()),
            Error::Parse(path, _) => {
                write!(f, "cannot parse config file {}", path.to_string_lossy())
            }
            Error::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl Config {
    /// Where the configuration of this program is looked up by default.
    pub fn default_fs_path() -> std::path::PathBuf {
        return crate::constants::DEFAULT_CONFIG_PATH.into();
    }

    /// Get configuration from filesystem.
    ///
    /// If no path is given, the default location is tried and built-in
    /// defaults are used in case there is no file. An explicitly given file
    /// must exist.
    pub fn get_from_fs(config_file_path: Option<std::path::PathBuf>) -> Result<Self, Error> {
        let (path, required): (std::path::PathBuf, bool) = match config_file_path {
            Some(path) => (path, true),
            None => (Self::default_fs_path(), false),
        };

        let content: String = match std::fs::read_to_string(&path) {
            Ok(n) => n,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(Error::Read(path, err)),
        };

        return Self::parse(&content).map_err(|err| match err {
            ParseError::Toml(err) => Error::Parse(path, err),
            ParseError::Invalid(reason) => Error::Invalid(reason),
        });
    }

    fn parse(content: &str) -> Result<Self, ParseError> {
        let config: Self = toml::from_str(content).map_err(ParseError::Toml)?;
        config.validate().map_err(ParseError::Invalid)?;
        return Ok(config);
    }

    fn validate(&self) -> Result<(), String> {
        if self.command_prefix.is_empty() {
            return Err("command_prefix must not be empty".into());
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(format!("unknown log_level '{}'", self.log_level));
        }
        if let Some(target) = &self.login_target {
            if !crate::registry::is_valid_app_id(&target.app_id) {
                return Err(format!(
                    "login_target.app_id must be a number, got '{}'",
                    target.app_id
                ));
            }
            if target.process_name.is_empty() {
                return Err("login_target.process_name must not be empty".into());
            }
        }
        return Ok(());
    }

    pub fn log_level(&self) -> log::LevelFilter {
        return self
            .log_level
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info);
    }
}

enum ParseError {
    Toml(toml::de::Error),
    Invalid(String),
}
