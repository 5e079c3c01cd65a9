//! Main error module.

/// Some critical dependency of the program is missing or misconfigured.
static EXIT_ERR_CONFIG: u8 = 42;

/// The chat platform credential is missing or was rejected.
static EXIT_ERR_CREDENTIAL: u8 = 43;

/// The chat client failed for some other reason.
static EXIT_ERR_CHAT: u8 = 44;

/// An offline registry operation failed.
static EXIT_ERR_REGISTRY: u8 = 45;

/// Non recoverable errors that the _main_ may exit with.
#[derive(Debug)]
pub enum FatalError {
    Config(crate::config::Error),
    Logger(crate::logging::Error),
    MissingToken,
    Runtime(std::io::Error),
    Chat(crate::chat::Error),
    Registry(crate::registry::Error),
}
impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FatalError::Config(err) => Some(err),
            FatalError::Logger(err) => Some(err),
            FatalError::Runtime(err) => Some(err),
            FatalError::Chat(err) => Some(err),
            FatalError::Registry(err) => Some(err),
            FatalError::MissingToken => None,
        }
    }
}
impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalError::Config(_) => write!(f, "cannot configure the program"),
            FatalError::Logger(_) => write!(f, "cannot set up logging"),
            FatalError::MissingToken => write!(
                f,
                "no bot token: set the {} environment variable",
                crate::constants::ENV_VARS_TOKEN.join(" or ")
            ),
            FatalError::Runtime(_) => write!(f, "cannot start the async runtime"),
            FatalError::Chat(_) => write!(f, "cannot serve commands over chat"),
            FatalError::Registry(_) => write!(f, "registry operation failed"),
        }
    }
}
impl From<crate::config::Error> for FatalError {
    fn from(err: crate::config::Error) -> Self {
        return Self::Config(err);
    }
}
impl From<crate::logging::Error> for FatalError {
    fn from(err: crate::logging::Error) -> Self {
        return Self::Logger(err);
    }
}
impl From<crate::chat::Error> for FatalError {
    fn from(err: crate::chat::Error) -> Self {
        return Self::Chat(err);
    }
}
impl From<crate::registry::Error> for FatalError {
    fn from(err: crate::registry::Error) -> Self {
        return Self::Registry(err);
    }
}

impl FatalError {
    pub fn exit_code(&self) -> std::process::ExitCode {
        return std::process::ExitCode::from(self.code());
    }

    fn code(&self) -> u8 {
        return match self {
            FatalError::Config(_) | FatalError::Logger(_) | FatalError::Runtime(_) => {
                EXIT_ERR_CONFIG
            }
            FatalError::MissingToken
            | FatalError::Chat(crate::chat::Error::InvalidToken)
            | FatalError::Chat(crate::chat::Error::IntentsNotEnabled) => EXIT_ERR_CREDENTIAL,
            FatalError::Chat(_) => EXIT_ERR_CHAT,
            FatalError::Registry(_) => EXIT_ERR_REGISTRY,
        };
    }
}

/// The chat platform token from the environment, if set.
pub fn token_from_env() -> Result<String, FatalError> {
    for name in crate::constants::ENV_VARS_TOKEN {
        if let Ok(value) = std::env::var(name) {
            let value: &str = value.trim();
            if !value.is_empty() {
                return Ok(value.into());
            }
        }
    }
    return Err(FatalError::MissingToken);
}
