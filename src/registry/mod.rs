//! Persisted registry of the games that can be controlled.
//!
//! The registry maps a lowercase _nickname_ to the information needed to
//! launch and find the game's process. The whole registry is written back to
//! disk on every mutation, and the in-memory state only changes once the write
//! has succeeded.

/// How to launch a game and how to find its process afterwards.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameDescriptor {
    /// Numeric identifier the storefront's launch scheme runs the game by.
    #[serde(rename = "appid")]
    pub app_id: String,

    /// Name of the game's process as seen in the OS process table.
    pub process_name: String,
}

impl std::fmt::Display for GameDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AppID {}, process {}", self.app_id, self.process_name)
    }
}

#[derive(Debug)]
pub enum Error {
    NotFound(String),
    AlreadyExists(String),
    InvalidAppId(String),
    Persistence(std::path::PathBuf, std::io::Error),
    Serialize(serde_json::Error),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Persistence(_, err) => Some(err),
            Error::Serialize(err) => Some(err),
            Error::NotFound(_) | Error::AlreadyExists(_) | Error::InvalidAppId(_) => None,
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound(nickname) => write!(f, "no game registered as '{nickname}'"),
            Error::AlreadyExists(nickname) => write!(f, "'{nickname}' already exists"),
            Error::InvalidAppId(app_id) => write!(f, "AppID must be a number, got '{app_id}'"),
            Error::Persistence(path, _) => {
                write!(f, "cannot write registry to {}", path.to_string_lossy())
            }
            Error::Serialize(_) => write!(f, "cannot serialize registry"),
        }
    }
}

/// Registered games in insertion order.
///
/// Serialized as a JSON object whose key order follows the insertion order,
/// which a plain map would not keep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Games(Vec<(String, GameDescriptor)>);

impl Games {
    fn position(&self, nickname: &str) -> Option<usize> {
        return self.0.iter().position(|(n, _)| n == nickname);
    }
}

impl serde::Serialize for Games {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        return serializer.collect_map(self.0.iter().map(|(n, d)| (n, d)));
    }
}

impl<'de> serde::Deserialize<'de> for Games {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct GamesVisitor;

        impl<'de> serde::de::Visitor<'de> for GamesVisitor {
            type Value = Games;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a map of game nicknames to game descriptors")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut games: Games = Games::default();
                while let Some((nickname, descriptor)) =
                    map.next_entry::<String, GameDescriptor>()?
                {
                    let nickname: String = nickname.to_lowercase();
                    match games.position(&nickname) {
                        Some(i) => games.0[i].1 = descriptor,
                        None => games.0.push((nickname, descriptor)),
                    }
                }
                return Ok(games);
            }
        }

        return deserializer.deserialize_map(GamesVisitor);
    }
}

/// The game registry, backed by a JSON file.
pub struct GameRegistry {
    path: std::path::PathBuf,
    games: Games,
}

impl GameRegistry {
    /// Load the registry from a given file.
    ///
    /// A missing file gives an empty registry. So does a file that cannot be
    /// read or parsed, in which case the problem is logged and the file gets
    /// overwritten by the next mutation.
    pub fn load(path: std::path::PathBuf) -> Self {
        let games: Games = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Games>(&content) {
                Ok(games) => {
                    log::info!(
                        "Loaded {} games from {}",
                        games.0.len(),
                        path.to_string_lossy()
                    );
                    games
                }
                Err(err) => {
                    log::warn!(
                        "Registry file {} is corrupted, starting with an empty registry: {err}",
                        path.to_string_lossy()
                    );
                    Games::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No registry file at {} yet, starting with an empty registry",
                    path.to_string_lossy()
                );
                Games::default()
            }
            Err(err) => {
                log::warn!(
                    "Cannot read registry file {}, starting with an empty registry: {err}",
                    path.to_string_lossy()
                );
                Games::default()
            }
        };

        return Self { path, games };
    }

    pub fn path(&self) -> &std::path::Path {
        return &self.path;
    }

    /// Look up a game by its nickname, case-insensitively.
    pub fn get(&self, nickname: &str) -> Result<&GameDescriptor, Error> {
        let nickname: String = nickname.to_lowercase();
        return match self.games.position(&nickname) {
            Some(i) => Ok(&self.games.0[i].1),
            None => Err(Error::NotFound(nickname)),
        };
    }

    /// Register a new game and persist the registry.
    pub fn add(
        &mut self,
        nickname: &str,
        app_id: &str,
        process_name: &str,
    ) -> Result<GameDescriptor, Error> {
        let nickname: String = nickname.to_lowercase();
        if self.games.position(&nickname).is_some() {
            return Err(Error::AlreadyExists(nickname));
        }
        if !is_valid_app_id(app_id) {
            return Err(Error::InvalidAppId(app_id.into()));
        }

        let descriptor: GameDescriptor = GameDescriptor {
            app_id: app_id.into(),
            process_name: process_name.into(),
        };
        let mut next: Games = self.games.clone();
        next.0.push((nickname.clone(), descriptor.clone()));
        self.persist(&next)?;
        self.games = next;

        log::info!("Registered game '{nickname}': {descriptor}");
        return Ok(descriptor);
    }

    /// Unregister a game and persist the registry.
    pub fn remove(&mut self, nickname: &str) -> Result<GameDescriptor, Error> {
        let nickname: String = nickname.to_lowercase();
        let i: usize = match self.games.position(&nickname) {
            Some(i) => i,
            None => return Err(Error::NotFound(nickname)),
        };

        let mut next: Games = self.games.clone();
        let (_, removed): (String, GameDescriptor) = next.0.remove(i);
        self.persist(&next)?;
        self.games = next;

        log::info!("Unregistered game '{nickname}'");
        return Ok(removed);
    }

    /// All registered games in the order they were added.
    pub fn list(&self) -> impl Iterator<Item = (&str, &GameDescriptor)> {
        return self.games.0.iter().map(|(n, d)| (n.as_str(), d));
    }

    pub fn nicknames(&self) -> Vec<String> {
        return self.games.0.iter().map(|(n, _)| n.clone()).collect();
    }

    pub fn is_empty(&self) -> bool {
        return self.games.0.is_empty();
    }

    /// Overwrite the registry file with the given content.
    fn persist(&self, games: &Games) -> Result<(), Error> {
        let mut buffer: Vec<u8> = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        serde::Serialize::serialize(games, &mut serializer).map_err(Error::Serialize)?;

        self.replace_file(&buffer)
            .map_err(|err| Error::Persistence(self.path.clone(), err))?;
        log::debug!(
            "Wrote {} games ({} bytes) to {}",
            games.0.len(),
            buffer.len(),
            self.path.to_string_lossy()
        );
        return Ok(());
    }

    /// Sibling of the registry file that new content is written to first.
    fn staging_path(&self) -> std::path::PathBuf {
        let mut name: std::ffi::OsString = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "games.json".into());
        name.push(".tmp");
        return self.path.with_file_name(name);
    }

    /// Write the content next to the registry file and move it in place, so
    /// that the registry file is either the old or the new content in full.
    fn replace_file(&self, content: &[u8]) -> Result<(), std::io::Error> {
        let staging: std::path::PathBuf = self.staging_path();
        let written: Result<(), std::io::Error> = write_synced(&staging, content)
            .and_then(|()| std::fs::rename(&staging, &self.path));
        if written.is_err() {
            let _ = std::fs::remove_file(&staging);
        }
        return written;
    }
}

fn write_synced(path: &std::path::Path, content: &[u8]) -> Result<(), std::io::Error> {
    let mut file: std::fs::File = std::fs::File::create(path)?;
    std::io::Write::write_all(&mut file, content)?;
    file.sync_all()?;
    return Ok(());
}

/// Storefront app IDs are non-empty strings of ASCII digits.
pub fn is_valid_app_id(app_id: &str) -> bool {
    return !app_id.is_empty() && app_id.chars().all(|c| c.is_ascii_digit());
}
