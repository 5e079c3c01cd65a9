pub const DEFAULT_CONFIG_PATH: &str = "gamectl.toml";

pub const DEFAULT_REGISTRY_PATH: &str = "games.json";

pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Environment variables the chat platform token is read from, in order of
/// preference.
pub const ENV_VARS_TOKEN: [&str; 2] = ["DISCORD_TOKEN", "DISCORD_BOT_TOKEN"];

/// Longest message the chat platform accepts, in characters.
pub const MESSAGE_LENGTH_MAX: usize = 2000;
