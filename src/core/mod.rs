//! Core functionality of the program: running the commands issued over chat.
//!
//! Every command runs as its own short pipeline of steps. Waits between the
//! steps are real suspensions, so other commands keep being served meanwhile.
//! Pipelines that control a game hold a lock for that game until they are
//! done, so overlapping commands on the same game run one after another
//! instead of interleaving their steps.

use crate::{
    input::{InputInjector, Key},
    parsing::{Command, UsageError},
    proc::{ProcessController, RunState, StopOutcome},
    registry::{GameDescriptor, GameRegistry},
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Who issued a command.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: u64,
    pub name: String,
}

/// Where responses to a command go.
pub trait Reply: Send + Sync {
    fn send(&self, message: String) -> impl std::future::Future<Output = ()> + Send;
}

/// Behavior of the dispatcher that is decided by the deployment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub command_prefix: String,
    /// Chat user IDs allowed to run owner-only commands.
    pub owners: Vec<u64>,
    pub restrict_press_key: bool,
    pub restart_settle: Duration,
    pub login: Option<LoginSequence>,
}

impl From<&crate::config::Config> for Settings {
    fn from(config: &crate::config::Config) -> Self {
        let login: Option<LoginSequence> =
            config
                .login_target
                .as_ref()
                .map(|target: &crate::config::LoginTarget| LoginSequence {
                    name: target.name.clone(),
                    app_id: target.app_id.clone(),
                    process_name: target.process_name.clone(),
                    keys: target.keys.clone(),
                    settle: Duration::from_secs(config.delays.login_settle_secs),
                    startup_wait: Duration::from_secs(config.delays.login_startup_secs),
                    key_interval: Duration::from_secs(config.delays.login_key_interval_secs),
                });

        return Self {
            command_prefix: config.command_prefix.clone(),
            owners: config.owner_id.into_iter().collect(),
            restrict_press_key: config.restrict_press_key,
            restart_settle: Duration::from_secs(config.delays.restart_settle_secs),
            login,
        };
    }
}

/// The fixed-target restart: stop, launch, wait for the game to boot and
/// press keys to get it to its login prompt.
#[derive(Debug, Clone)]
pub struct LoginSequence {
    pub name: String,
    pub app_id: String,
    pub process_name: String,
    pub keys: Vec<Key>,
    pub settle: Duration,
    pub startup_wait: Duration,
    pub key_interval: Duration,
}

/// Step of a multi-step pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Stopping,
    Waiting,
    Starting,
    PressingKeys,
}
impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Stopping => write!(f, "stopping"),
            Stage::Waiting => write!(f, "waiting"),
            Stage::Starting => write!(f, "starting"),
            Stage::PressingKeys => write!(f, "pressing keys"),
        }
    }
}

/// Progress of one restart pipeline. Lives only as long as the command.
#[derive(Debug)]
struct RestartSequence {
    game: String,
    stage: Stage,
}

impl RestartSequence {
    fn begin(game: &str) -> Self {
        log::debug!("Restart of '{game}': {}", Stage::Stopping);
        return Self {
            game: game.into(),
            stage: Stage::Stopping,
        };
    }

    fn advance(&mut self, stage: Stage) {
        log::debug!("Restart of '{}': {} -> {stage}", self.game, self.stage);
        self.stage = stage;
    }

    fn abort(&self, cause: Error) -> Error {
        return Error::RestartAborted {
            game: self.game.clone(),
            stage: self.stage,
            cause: Box::new(cause),
        };
    }

    fn finish(self) {
        log::debug!("Restart of '{}' completed", self.game);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOutcome {
    Launched,
    AlreadyRunning,
}

/// Everything that can go wrong with a command. Each reaches the caller as a
/// response of its own.
#[derive(Debug)]
pub enum Error {
    UnknownGame {
        nickname: String,
        available: Vec<String>,
    },
    AlreadyExists(String),
    InvalidAppId(String),
    InvalidKey(crate::input::InvalidKey),
    Unauthorized {
        verb: &'static str,
    },
    Persistence(crate::registry::Error),
    Os {
        action: &'static str,
        target: String,
        source: crate::proc::Error,
    },
    RestartAborted {
        game: String,
        stage: Stage,
        cause: Box<Error>,
    },
    /// There is no login target to run the login sequence on.
    NotConfigured,
    Usage(UsageError),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Persistence(err) => Some(err),
            Error::Os { source, .. } => Some(source),
            Error::RestartAborted { cause, .. } => Some(cause.as_ref()),
            Error::UnknownGame { .. }
            | Error::AlreadyExists(_)
            | Error::InvalidAppId(_)
            | Error::InvalidKey(_)
            | Error::Unauthorized { .. }
            | Error::NotConfigured
            | Error::Usage(_) => None,
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownGame {
                nickname,
                available,
            } if available.is_empty() => {
                write!(f, "unknown game `{nickname}`, no games have been added yet")
            }
            Error::UnknownGame {
                nickname,
                available,
            } => write!(
                f,
                "unknown game `{nickname}`, available: {}",
                available.join(", ")
            ),
            Error::AlreadyExists(nickname) => write!(f, "`{nickname}` already exists"),
            Error::InvalidAppId(app_id) => write!(f, "AppID must be a number, got `{app_id}`"),
            Error::InvalidKey(err) => write!(f, "{err}"),
            Error::Unauthorized { verb } => write!(f, "you are not allowed to use `{verb}`"),
            Error::Persistence(_) => write!(f, "could not save the game list, nothing was changed"),
            Error::Os { action, target, .. } => write!(f, "failed to {action} {target}"),
            Error::RestartAborted { game, stage, .. } => {
                write!(f, "restart of {game} aborted while {stage}")
            }
            Error::NotConfigured => write!(f, "no login target has been configured"),
            Error::Usage(err) => write!(f, "{err}"),
        }
    }
}

impl Error {
    fn os(action: &'static str, target: &str, source: crate::proc::Error) -> Self {
        return Self::Os {
            action,
            target: target.into(),
            source,
        };
    }

    /// The chat response reporting this error: the error and its sources.
    pub fn response(&self) -> String {
        let icon: &str = match self {
            Error::Unauthorized { .. } => "⛔",
            Error::Usage(_) => "ℹ️",
            Error::AlreadyExists(_)
            | Error::Persistence(_)
            | Error::Os { .. }
            | Error::RestartAborted { .. } => "⚠️",
            Error::UnknownGame { .. }
            | Error::InvalidAppId(_)
            | Error::InvalidKey(_)
            | Error::NotConfigured => "❌",
        };

        let mut text: String = capitalize(&self.to_string());
        let mut next: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(err) = next {
            text.push_str(": ");
            text.push_str(&err.to_string());
            next = err.source();
        }
        text.push('.');

        return format!("{icon} {text}");
    }
}

fn capitalize(text: &str) -> String {
    let mut chars: std::str::Chars = text.chars();
    return match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
}

/// Run a blocking OS call without holding up the async runtime.
async fn blocking<T, F>(call: F) -> Result<T, crate::proc::Error>
where
    F: FnOnce() -> Result<T, crate::proc::Error> + Send + 'static,
    T: Send + 'static,
{
    return match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(err) => Err(crate::proc::Error::Interrupted(err.to_string())),
    };
}

/// Maps chat commands to registry, process and key press operations.
pub struct Dispatcher<P: ProcessController, K: InputInjector> {
    registry: Arc<Mutex<GameRegistry>>,
    processes: Arc<P>,
    keyboard: Arc<K>,
    settings: Settings,
    /// One lock per process name, held by pipelines controlling it.
    target_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<P: ProcessController, K: InputInjector> Dispatcher<P, K> {
    pub fn new(registry: GameRegistry, processes: P, keyboard: K, settings: Settings) -> Self {
        return Self {
            registry: Arc::new(Mutex::new(registry)),
            processes: Arc::new(processes),
            keyboard: Arc::new(keyboard),
            settings,
            target_locks: Mutex::new(HashMap::new()),
        };
    }

    pub fn registry(&self) -> &Arc<Mutex<GameRegistry>> {
        return &self.registry;
    }

    pub fn settings(&self) -> &Settings {
        return &self.settings;
    }

    /// Replace who may run owner-only commands.
    pub fn set_owners(&mut self, owners: Vec<u64>) {
        log::info!("Owner-only commands are allowed for {owners:?}");
        self.settings.owners = owners;
    }

    /// Handle a chat message. Returns `false` if the message was not a
    /// command at all, in which case nothing was sent.
    pub async fn handle_message<R: Reply>(&self, caller: &Caller, content: &str, reply: &R) -> bool {
        match crate::parsing::parse_command(&self.settings.command_prefix, content) {
            None => return false,
            Some(Err(usage)) => {
                log::debug!("{} gave incomplete command: {usage}", caller.name);
                reply.send(Error::Usage(usage).response()).await;
            }
            Some(Ok(command)) => {
                let _ = self.dispatch(caller, command, reply).await;
            }
        }
        return true;
    }

    /// Run a command and respond to the caller. A failure has already been
    /// reported to the caller when this returns.
    pub async fn dispatch<R: Reply>(
        &self,
        caller: &Caller,
        command: Command,
        reply: &R,
    ) -> Result<(), Error> {
        let verb: &'static str = command.verb();
        log::info!("{} ({}) issued {verb}: {command:?}", caller.name, caller.id);

        let result: Result<(), Error> = self.execute(caller, command, reply).await;
        match &result {
            Ok(()) => log::info!("{verb} by {} completed", caller.name),
            Err(err) => {
                log::warn!("{verb} by {} failed: {}", caller.name, err.response());
                reply.send(err.response()).await;
            }
        }
        return result;
    }

    async fn execute<R: Reply>(
        &self,
        caller: &Caller,
        command: Command,
        reply: &R,
    ) -> Result<(), Error> {
        self.authorize(caller, &command)?;

        return match command {
            Command::Status { game } => self.status(&game, reply).await,
            Command::Start { game } => self.start(&game, reply).await,
            Command::Stop { game } => self.stop(&game, reply).await,
            Command::Restart { game } => self.restart(&game, reply).await,
            Command::Add {
                nickname,
                app_id,
                process_name,
            } => self.add(&nickname, &app_id, &process_name, reply).await,
            Command::Remove { nickname } => self.remove(&nickname, reply).await,
            Command::List => self.list(reply).await,
            Command::PressKey { key } => self.press_key(&key, reply).await,
            Command::RestartWithLogin => self.restart_with_login(reply).await,
            Command::LoginStatus => self.login_status(reply).await,
            Command::Help => {
                reply
                    .send(crate::text::chat_help(&self.settings.command_prefix))
                    .await;
                Ok(())
            }
        };
    }

    fn requires_owner(&self, command: &Command) -> bool {
        match command {
            Command::Start { .. }
            | Command::Stop { .. }
            | Command::Restart { .. }
            | Command::Add { .. }
            | Command::Remove { .. } => true,
            Command::PressKey { .. } => self.settings.restrict_press_key,
            Command::Status { .. }
            | Command::List
            | Command::RestartWithLogin
            | Command::LoginStatus
            | Command::Help => false,
        }
    }

    fn authorize(&self, caller: &Caller, command: &Command) -> Result<(), Error> {
        if !self.requires_owner(command) || self.settings.owners.contains(&caller.id) {
            return Ok(());
        }
        return Err(Error::Unauthorized {
            verb: command.verb(),
        });
    }

    async fn resolve(&self, game: &str) -> Result<(String, GameDescriptor), Error> {
        let registry = self.registry.lock().await;
        return match registry.get(game) {
            Ok(descriptor) => Ok((game.to_lowercase(), descriptor.clone())),
            Err(_) => Err(Error::UnknownGame {
                nickname: game.to_lowercase(),
                available: registry.nicknames(),
            }),
        };
    }

    async fn lock_target(&self, process_name: &str) -> OwnedMutexGuard<()> {
        let lock: Arc<Mutex<()>> = {
            let mut locks = self.target_locks.lock().await;
            Arc::clone(locks.entry(process_name.to_lowercase()).or_default())
        };
        return lock.lock_owned().await;
    }

    async fn is_running(&self, process_name: &str) -> Result<RunState, crate::proc::Error> {
        let processes: Arc<P> = Arc::clone(&self.processes);
        let process_name: String = process_name.into();
        return blocking(move || processes.is_running(&process_name)).await;
    }

    async fn stop_process(&self, process_name: &str) -> Result<StopOutcome, crate::proc::Error> {
        let processes: Arc<P> = Arc::clone(&self.processes);
        let process_name: String = process_name.into();
        return blocking(move || processes.stop(&process_name)).await;
    }

    async fn launch(&self, app_id: &str) -> Result<(), crate::proc::Error> {
        let processes: Arc<P> = Arc::clone(&self.processes);
        let app_id: String = app_id.into();
        return blocking(move || processes.launch(&app_id)).await;
    }

    async fn press(&self, key: Key) -> Result<(), crate::proc::Error> {
        let keyboard: Arc<K> = Arc::clone(&self.keyboard);
        return blocking(move || keyboard.press(key)).await;
    }

    /// Launch unless already running.
    async fn start_game(
        &self,
        nickname: &str,
        descriptor: &GameDescriptor,
    ) -> Result<StartOutcome, Error> {
        let state: RunState = self
            .is_running(&descriptor.process_name)
            .await
            .map_err(|err| Error::os("check status of", nickname, err))?;
        if state == RunState::Running {
            log::info!("Not launching '{nickname}': already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.launch(&descriptor.app_id)
            .await
            .map_err(|err| Error::os("start", nickname, err))?;
        log::info!("Launched '{nickname}' by AppID {}", descriptor.app_id);
        return Ok(StartOutcome::Launched);
    }

    async fn stop_game(
        &self,
        nickname: &str,
        descriptor: &GameDescriptor,
    ) -> Result<StopOutcome, Error> {
        let outcome: StopOutcome = self
            .stop_process(&descriptor.process_name)
            .await
            .map_err(|err| Error::os("stop", nickname, err))?;
        log::info!("Stopping '{nickname}': {outcome:?}");
        return Ok(outcome);
    }

    async fn status<R: Reply>(&self, game: &str, reply: &R) -> Result<(), Error> {
        let (nickname, descriptor) = self.resolve(game).await?;
        let state: RunState = self
            .is_running(&descriptor.process_name)
            .await
            .map_err(|err| Error::os("check status of", &nickname, err))?;
        reply.send(running_message(&nickname, &descriptor.process_name, state)).await;
        return Ok(());
    }

    async fn start<R: Reply>(&self, game: &str, reply: &R) -> Result<(), Error> {
        let (nickname, descriptor) = self.resolve(game).await?;
        let _guard: OwnedMutexGuard<()> = self.lock_target(&descriptor.process_name).await;

        let message: String = match self.start_game(&nickname, &descriptor).await? {
            StartOutcome::Launched => format!(
                "🚀 **{nickname}** (AppID: `{}`) has been launched.",
                descriptor.app_id
            ),
            StartOutcome::AlreadyRunning => format!(
                "ℹ️ **{nickname}** (`{}`) is already running.",
                descriptor.process_name
            ),
        };
        reply.send(message).await;
        return Ok(());
    }

    async fn stop<R: Reply>(&self, game: &str, reply: &R) -> Result<(), Error> {
        let (nickname, descriptor) = self.resolve(game).await?;
        let _guard: OwnedMutexGuard<()> = self.lock_target(&descriptor.process_name).await;

        let message: String = match self.stop_game(&nickname, &descriptor).await? {
            StopOutcome::Stopped => format!(
                "🛑 **{nickname}** (`{}`) has been stopped.",
                descriptor.process_name
            ),
            StopOutcome::NotRunning => format!(
                "ℹ️ **{nickname}** (`{}`) was not running.",
                descriptor.process_name
            ),
        };
        reply.send(message).await;
        return Ok(());
    }

    /// Stop, let the OS release the game's resources, start again. The game
    /// is looked up again before starting, in case it was removed meanwhile.
    async fn restart<R: Reply>(&self, game: &str, reply: &R) -> Result<(), Error> {
        let (nickname, descriptor) = self.resolve(game).await?;
        let _guard: OwnedMutexGuard<()> = self.lock_target(&descriptor.process_name).await;

        reply
            .send(format!("🔄 Beginning restart sequence for **{nickname}**..."))
            .await;
        let mut sequence: RestartSequence = RestartSequence::begin(&nickname);

        let stopped: StopOutcome = self
            .stop_game(&nickname, &descriptor)
            .await
            .map_err(|err| sequence.abort(err))?;

        sequence.advance(Stage::Waiting);
        tokio::time::sleep(self.settings.restart_settle).await;

        sequence.advance(Stage::Starting);
        let (nickname, descriptor) = self.resolve(game).await.map_err(|err| sequence.abort(err))?;
        let started: StartOutcome = self
            .start_game(&nickname, &descriptor)
            .await
            .map_err(|err| sequence.abort(err))?;
        sequence.finish();

        let stopped: &str = match stopped {
            StopOutcome::Stopped => "stopped",
            StopOutcome::NotRunning => "was not running",
        };
        let started: &str = match started {
            StartOutcome::Launched => "launched",
            StartOutcome::AlreadyRunning => "already running again, not launched",
        };
        reply
            .send(format!(
                "✅ Restart sequence for **{nickname}** is complete: {stopped}, {started}."
            ))
            .await;
        return Ok(());
    }

    async fn add<R: Reply>(
        &self,
        nickname: &str,
        app_id: &str,
        process_name: &str,
        reply: &R,
    ) -> Result<(), Error> {
        let added: GameDescriptor = {
            let mut registry = self.registry.lock().await;
            registry
                .add(nickname, app_id, process_name)
                .map_err(|err| match err {
                    crate::registry::Error::AlreadyExists(nickname) => {
                        Error::AlreadyExists(nickname)
                    }
                    crate::registry::Error::InvalidAppId(app_id) => Error::InvalidAppId(app_id),
                    err => Error::Persistence(err),
                })?
        };
        reply
            .send(format!(
                "✅ Added `{}` (AppID: `{}`, Process: `{}`).",
                nickname.to_lowercase(),
                added.app_id,
                added.process_name
            ))
            .await;
        return Ok(());
    }

    async fn remove<R: Reply>(&self, nickname: &str, reply: &R) -> Result<(), Error> {
        {
            let mut registry = self.registry.lock().await;
            registry.remove(nickname).map_err(|err| match err {
                crate::registry::Error::NotFound(nickname) => Error::UnknownGame {
                    nickname,
                    available: registry.nicknames(),
                },
                err => Error::Persistence(err),
            })?;
        }
        reply
            .send(format!("✅ Removed `{}` from the list.", nickname.to_lowercase()))
            .await;
        return Ok(());
    }

    async fn list<R: Reply>(&self, reply: &R) -> Result<(), Error> {
        let message: String = {
            let registry = self.registry.lock().await;
            if registry.is_empty() {
                format!(
                    "🤷 No games have been added yet. Use `{}add` to add one.",
                    self.settings.command_prefix
                )
            } else {
                let mut message: String = String::from("🎮 **Configured games**");
                for (nickname, descriptor) in registry.list() {
                    message.push_str(&format!(
                        "\n**{nickname}**: AppID `{}`, process `{}`",
                        descriptor.app_id, descriptor.process_name
                    ));
                }
                message
            }
        };
        reply.send(message).await;
        return Ok(());
    }

    async fn press_key<R: Reply>(&self, key: &str, reply: &R) -> Result<(), Error> {
        let parsed: Key = key.parse::<Key>().map_err(Error::InvalidKey)?;
        self.press(parsed)
            .await
            .map_err(|err| Error::os("press", &format!("key `{parsed}`"), err))?;
        reply.send(format!("⌨️ Pressed: `{parsed}`")).await;
        return Ok(());
    }

    /// Kill and relaunch the login target, then press keys once it has had
    /// time to show its login prompt.
    async fn restart_with_login<R: Reply>(&self, reply: &R) -> Result<(), Error> {
        let login: &LoginSequence = self.settings.login.as_ref().ok_or(Error::NotConfigured)?;
        let _guard: OwnedMutexGuard<()> = self.lock_target(&login.process_name).await;
        let descriptor: GameDescriptor = GameDescriptor {
            app_id: login.app_id.clone(),
            process_name: login.process_name.clone(),
        };

        reply.send(format!("🔄 Closing **{}**...", login.name)).await;
        let mut sequence: RestartSequence = RestartSequence::begin(&login.name);
        self.stop_game(&login.name, &descriptor)
            .await
            .map_err(|err| sequence.abort(err))?;

        sequence.advance(Stage::Waiting);
        tokio::time::sleep(login.settle).await;

        sequence.advance(Stage::Starting);
        self.launch(&login.app_id)
            .await
            .map_err(|err| sequence.abort(Error::os("start", &login.name, err)))?;
        reply
            .send(format!(
                "🚀 **{}** launching... Waiting {}s for splash screen and QR generation.",
                login.name,
                login.startup_wait.as_secs()
            ))
            .await;
        tokio::time::sleep(login.startup_wait).await;

        sequence.advance(Stage::PressingKeys);
        for (i, key) in login.keys.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(login.key_interval).await;
            }
            self.press(*key).await.map_err(|err| {
                sequence.abort(Error::os("press", &format!("key `{key}`"), err))
            })?;
        }
        sequence.finish();

        reply
            .send(format!(
                "✅ **{}** startup sequence complete (QR code should be available for log in).",
                login.name
            ))
            .await;
        return Ok(());
    }

    async fn login_status<R: Reply>(&self, reply: &R) -> Result<(), Error> {
        let login: &LoginSequence = self.settings.login.as_ref().ok_or(Error::NotConfigured)?;
        let state: RunState = self
            .is_running(&login.process_name)
            .await
            .map_err(|err| Error::os("check status of", &login.name, err))?;
        reply
            .send(running_message(&login.name, &login.process_name, state))
            .await;
        return Ok(());
    }
}

fn running_message(name: &str, process_name: &str, state: RunState) -> String {
    return match state {
        RunState::Running => format!("✅ **{name}** (`{process_name}`) is **running**."),
        RunState::NotRunning => format!("❌ **{name}** (`{process_name}`) is **not running**."),
    };
}
