use gamectl::{
    core::{Caller, Dispatcher, Error, LoginSequence, Reply, Settings, Stage},
    input::{InputInjector, Key},
    parsing::Command,
    proc::{ProcessController, RunState, StopOutcome},
    registry::GameRegistry,
};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

const OWNER_ID: u64 = 1001;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Stop(String),
    Launch(String),
    IsRunning(String),
    Press(Key),
}

#[derive(Default)]
struct HostState {
    calls: Vec<Call>,
    running: HashSet<String>,
    /// Which process appears when an app ID is launched.
    apps: HashMap<String, String>,
    /// Operations that fail as if their OS tool was not installed.
    failing: HashSet<&'static str>,
}

/// Stands in for both the process table and the keyboard, recording every
/// OS call in one log.
#[derive(Clone, Default)]
struct FakeHost {
    state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    fn with_app(self, app_id: &str, process_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .apps
            .insert(app_id.into(), process_name.into());
        return self;
    }

    fn with_running(self, process_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .running
            .insert(process_name.to_lowercase());
        return self;
    }

    fn failing(self, operation: &'static str) -> Self {
        self.state.lock().unwrap().failing.insert(operation);
        return self;
    }

    fn calls(&self) -> Vec<Call> {
        return self.state.lock().unwrap().calls.clone();
    }

    fn launches(&self) -> usize {
        return self
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::Launch(_)))
            .count();
    }

    fn is_running(&self, process_name: &str) -> bool {
        return self
            .state
            .lock()
            .unwrap()
            .running
            .contains(&process_name.to_lowercase());
    }
}

impl ProcessController for FakeHost {
    fn stop(&self, process_name: &str) -> Result<StopOutcome, gamectl::proc::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Stop(process_name.into()));
        if state.failing.contains("stop") {
            return Err(gamectl::proc::Error::ToolNotFound { tool: "pkill" });
        }
        return match state.running.remove(&process_name.to_lowercase()) {
            true => Ok(StopOutcome::Stopped),
            false => Ok(StopOutcome::NotRunning),
        };
    }

    fn launch(&self, app_id: &str) -> Result<(), gamectl::proc::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Launch(app_id.into()));
        if state.failing.contains("launch") {
            return Err(gamectl::proc::Error::ToolNotFound { tool: "xdg-open" });
        }
        if let Some(process_name) = state.apps.get(app_id).cloned() {
            state.running.insert(process_name.to_lowercase());
        }
        return Ok(());
    }

    fn is_running(&self, process_name: &str) -> Result<RunState, gamectl::proc::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::IsRunning(process_name.into()));
        return match state.running.contains(&process_name.to_lowercase()) {
            true => Ok(RunState::Running),
            false => Ok(RunState::NotRunning),
        };
    }
}

impl InputInjector for FakeHost {
    fn press(&self, key: Key) -> Result<(), gamectl::proc::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Press(key));
        if state.failing.contains("press") {
            return Err(gamectl::proc::Error::ToolNotFound { tool: "xdotool" });
        }
        return Ok(());
    }
}

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<String>>,
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        return self.messages.lock().unwrap().clone();
    }

    fn last(&self) -> String {
        return self.messages().last().cloned().unwrap_or_default();
    }
}

impl Reply for Recorder {
    async fn send(&self, message: String) {
        self.messages.lock().unwrap().push(message);
    }
}

fn owner() -> Caller {
    return Caller {
        id: OWNER_ID,
        name: "owner".into(),
    };
}

fn stranger() -> Caller {
    return Caller {
        id: 2002,
        name: "stranger".into(),
    };
}

fn settings() -> Settings {
    return Settings {
        command_prefix: "!".into(),
        owners: vec![OWNER_ID],
        restrict_press_key: false,
        restart_settle: Duration::ZERO,
        login: None,
    };
}

fn login_sequence() -> LoginSequence {
    return LoginSequence {
        name: "Sunderfolk".into(),
        app_id: "2414270".into(),
        process_name: "Sunderfolk".into(),
        keys: vec![Key::Enter, Key::Enter],
        settle: Duration::ZERO,
        startup_wait: Duration::ZERO,
        key_interval: Duration::ZERO,
    };
}

fn dispatcher_in(
    dir: &tempfile::TempDir,
    host: &FakeHost,
    settings: Settings,
) -> Dispatcher<FakeHost, FakeHost> {
    let registry: GameRegistry = GameRegistry::load(dir.path().join("games.json"));
    return Dispatcher::new(registry, host.clone(), host.clone(), settings);
}

fn add_valheim() -> Command {
    return Command::Add {
        nickname: "valheim".into(),
        app_id: "892970".into(),
        process_name: "valheim_server.exe".into(),
    };
}

fn game(name: &str) -> String {
    return name.into();
}

#[tokio::test]
async fn add_list_start_and_start_again() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_app("892970", "valheim_server.exe");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();
    assert_eq!(dispatcher.registry().lock().await.nicknames(), vec![game("valheim")]);

    dispatcher.dispatch(&stranger(), Command::List, &reply).await.unwrap();
    assert!(reply.last().contains("**valheim**: AppID `892970`, process `valheim_server.exe`"));

    dispatcher
        .dispatch(&owner(), Command::Start { game: game("valheim") }, &reply)
        .await
        .unwrap();
    assert_eq!(
        host.calls(),
        vec![
            Call::IsRunning("valheim_server.exe".into()),
            Call::Launch("892970".into())
        ]
    );
    assert!(reply.last().contains("has been launched"));

    dispatcher
        .dispatch(&owner(), Command::Start { game: game("Valheim") }, &reply)
        .await
        .unwrap();
    assert_eq!(host.launches(), 1);
    assert!(reply.last().contains("already running"));
    assert_eq!(reply.messages().len(), 4);
}

#[tokio::test]
async fn invalid_key_presses_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    let result = dispatcher
        .dispatch(&stranger(), Command::PressKey { key: "F9".into() }, &reply)
        .await;

    assert!(matches!(result, Err(Error::InvalidKey(_))));
    assert!(host.calls().is_empty());
    assert_eq!(reply.messages().len(), 1);
    assert!(reply.last().starts_with("❌ Invalid key 'F9'"));
}

#[tokio::test]
async fn valid_key_is_pressed_once() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    dispatcher
        .dispatch(&stranger(), Command::PressKey { key: "ENTER".into() }, &reply)
        .await
        .unwrap();

    assert_eq!(host.calls(), vec![Call::Press(Key::Enter)]);
    assert_eq!(reply.messages(), vec!["⌨️ Pressed: `enter`".to_string()]);
}

#[tokio::test]
async fn press_can_be_restricted_to_owner() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let mut settings: Settings = settings();
    settings.restrict_press_key = true;
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    let result = dispatcher
        .dispatch(&stranger(), Command::PressKey { key: "a".into() }, &reply)
        .await;
    assert!(matches!(result, Err(Error::Unauthorized { verb: "press" })));
    assert!(host.calls().is_empty());

    dispatcher
        .dispatch(&owner(), Command::PressKey { key: "a".into() }, &reply)
        .await
        .unwrap();
    assert_eq!(host.calls(), vec![Call::Press(Key::Char('a'))]);
}

#[tokio::test]
async fn stranger_cannot_control_or_modify() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_running("valheim_server.exe");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();

    let commands: Vec<Command> = vec![
        Command::Stop { game: game("valheim") },
        Command::Start { game: game("valheim") },
        Command::Restart { game: game("valheim") },
        Command::Remove { nickname: game("valheim") },
        Command::Add {
            nickname: "rust".into(),
            app_id: "258550".into(),
            process_name: "RustDedicated".into(),
        },
    ];
    for command in commands {
        let verb: &str = command.verb();
        let result = dispatcher.dispatch(&stranger(), command, &reply).await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })), "{verb}");
        assert!(reply.last().starts_with("⛔"), "{verb}");
    }

    assert!(host.calls().is_empty());
    assert!(host.is_running("valheim_server.exe"));
    assert_eq!(dispatcher.registry().lock().await.nicknames(), vec![game("valheim")]);
}

#[tokio::test]
async fn no_owner_configured_means_nobody_is_owner() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let mut settings: Settings = settings();
    settings.owners = Vec::new();
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    let result = dispatcher.dispatch(&owner(), add_valheim(), &reply).await;
    assert!(matches!(result, Err(Error::Unauthorized { verb: "add" })));
}

#[tokio::test]
async fn owners_can_be_supplied_after_startup() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let mut settings: Settings = settings();
    settings.owners = Vec::new();
    let mut dispatcher = dispatcher_in(&dir, &host, settings);
    dispatcher.set_owners(vec![3003, OWNER_ID]);
    let reply: Recorder = Recorder::default();

    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();
    let result = dispatcher
        .dispatch(&stranger(), Command::Remove { nickname: game("valheim") }, &reply)
        .await;
    assert!(matches!(result, Err(Error::Unauthorized { verb: "remove" })));
}

#[tokio::test]
async fn unknown_game_is_reported_the_same_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_running("ghost.exe");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let setup: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &setup).await.unwrap();

    let commands: Vec<Command> = vec![
        Command::Status { game: game("Ghost") },
        Command::Start { game: game("Ghost") },
        Command::Stop { game: game("Ghost") },
        Command::Restart { game: game("Ghost") },
    ];
    for command in commands {
        let reply: Recorder = Recorder::default();
        let result = dispatcher.dispatch(&owner(), command, &reply).await;
        match result {
            Err(Error::UnknownGame {
                nickname,
                available,
            }) => {
                assert_eq!(nickname, "ghost");
                assert_eq!(available, vec![game("valheim")]);
            }
            other => panic!("expected unknown game, got {other:?}"),
        }
        assert_eq!(
            reply.messages(),
            vec!["❌ Unknown game `ghost`, available: valheim.".to_string()]
        );
    }
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn status_ignores_case_of_nickname() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_running("VALHEIM_SERVER.EXE");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();

    dispatcher
        .dispatch(&stranger(), Command::Status { game: game("VALHEIM") }, &reply)
        .await
        .unwrap();
    assert_eq!(
        reply.last(),
        "✅ **valheim** (`valheim_server.exe`) is **running**."
    );

    dispatcher
        .dispatch(&owner(), Command::Stop { game: game("valheim") }, &reply)
        .await
        .unwrap();
    dispatcher
        .dispatch(&stranger(), Command::Status { game: game("valheim") }, &reply)
        .await
        .unwrap();
    assert_eq!(
        reply.last(),
        "❌ **valheim** (`valheim_server.exe`) is **not running**."
    );
}

#[tokio::test]
async fn stop_of_stopped_game_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();

    dispatcher
        .dispatch(&owner(), Command::Stop { game: game("valheim") }, &reply)
        .await
        .unwrap();
    assert_eq!(reply.last(), "ℹ️ **valheim** (`valheim_server.exe`) was not running.");
}

#[tokio::test]
async fn restart_stops_then_starts() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default()
        .with_app("892970", "valheim_server.exe")
        .with_running("valheim_server.exe");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let setup: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &setup).await.unwrap();

    let reply: Recorder = Recorder::default();
    dispatcher
        .dispatch(&owner(), Command::Restart { game: game("valheim") }, &reply)
        .await
        .unwrap();

    assert_eq!(
        host.calls(),
        vec![
            Call::Stop("valheim_server.exe".into()),
            Call::IsRunning("valheim_server.exe".into()),
            Call::Launch("892970".into()),
        ]
    );
    assert_eq!(
        reply.messages(),
        vec![
            "🔄 Beginning restart sequence for **valheim**...".to_string(),
            "✅ Restart sequence for **valheim** is complete: stopped, launched.".into(),
        ]
    );
}

#[tokio::test]
async fn restart_aborts_when_stopping_fails() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().failing("stop");
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let setup: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &setup).await.unwrap();

    let reply: Recorder = Recorder::default();
    let result = dispatcher
        .dispatch(&owner(), Command::Restart { game: game("valheim") }, &reply)
        .await;

    match result {
        Err(Error::RestartAborted { stage, cause, .. }) => {
            assert_eq!(stage, Stage::Stopping);
            assert!(matches!(*cause, Error::Os { action: "stop", .. }));
        }
        other => panic!("expected restart aborted, got {other:?}"),
    }
    assert_eq!(host.launches(), 0);
    assert_eq!(
        reply.last(),
        "⚠️ Restart of valheim aborted while stopping: failed to stop valheim: \
         required program 'pkill' was not found on this system."
    );
}

#[tokio::test]
async fn restart_aborts_when_game_is_removed_while_settling() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default()
        .with_app("892970", "valheim_server.exe")
        .with_running("valheim_server.exe");
    let mut settings: Settings = settings();
    settings.restart_settle = Duration::from_millis(200);
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let setup: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &setup).await.unwrap();

    let reply: Recorder = Recorder::default();
    let caller: Caller = owner();
    let (restarted, removed) = tokio::join!(
        dispatcher.dispatch(&caller, Command::Restart { game: game("valheim") }, &reply),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            dispatcher
                .dispatch(&caller, Command::Remove { nickname: game("valheim") }, &setup)
                .await
        },
    );
    removed.unwrap();

    match restarted {
        Err(Error::RestartAborted { stage, cause, .. }) => {
            assert_eq!(stage, Stage::Starting);
            assert!(matches!(*cause, Error::UnknownGame { .. }));
        }
        other => panic!("expected restart aborted, got {other:?}"),
    }
    assert_eq!(host.calls(), vec![Call::Stop("valheim_server.exe".into())]);
    assert_eq!(
        reply.last(),
        "⚠️ Restart of valheim aborted while starting: unknown game `valheim`, \
         no games have been added yet."
    );
}

#[tokio::test]
async fn overlapping_restarts_of_one_game_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default()
        .with_app("892970", "valheim_server.exe")
        .with_running("valheim_server.exe");
    let mut settings: Settings = settings();
    settings.restart_settle = Duration::from_millis(20);
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let setup: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &setup).await.unwrap();

    let (first, second) = (Recorder::default(), Recorder::default());
    let caller: Caller = owner();
    let (a, b) = tokio::join!(
        dispatcher.dispatch(&caller, Command::Restart { game: game("valheim") }, &first),
        dispatcher.dispatch(&caller, Command::Restart { game: game("valheim") }, &second),
    );
    a.unwrap();
    b.unwrap();

    let once: Vec<Call> = vec![
        Call::Stop("valheim_server.exe".into()),
        Call::IsRunning("valheim_server.exe".into()),
        Call::Launch("892970".into()),
    ];
    assert_eq!(host.calls(), [once.clone(), once].concat());
}

#[tokio::test]
async fn restart_with_login_runs_the_whole_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_running("sunderfolk");
    let mut settings: Settings = settings();
    settings.login = Some(login_sequence());
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    dispatcher
        .dispatch(&stranger(), Command::RestartWithLogin, &reply)
        .await
        .unwrap();

    assert_eq!(
        host.calls(),
        vec![
            Call::Stop("Sunderfolk".into()),
            Call::Launch("2414270".into()),
            Call::Press(Key::Enter),
            Call::Press(Key::Enter),
        ]
    );
    let messages: Vec<String> = reply.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], "🔄 Closing **Sunderfolk**...");
    assert!(messages[1].contains("Waiting 0s"));
    assert!(messages[2].contains("startup sequence complete"));
}

#[tokio::test]
async fn restart_with_login_reports_failed_launch() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().failing("launch");
    let mut settings: Settings = settings();
    settings.login = Some(login_sequence());
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    let result = dispatcher
        .dispatch(&stranger(), Command::RestartWithLogin, &reply)
        .await;

    match result {
        Err(Error::RestartAborted { stage, cause, .. }) => {
            assert_eq!(stage, Stage::Starting);
            assert!(matches!(*cause, Error::Os { action: "start", .. }));
        }
        other => panic!("expected restart aborted, got {other:?}"),
    }
    assert_eq!(
        host.calls(),
        vec![
            Call::Stop("Sunderfolk".into()),
            Call::Launch("2414270".into())
        ]
    );
    assert_eq!(
        reply.last(),
        "⚠️ Restart of Sunderfolk aborted while starting: failed to start Sunderfolk: \
         required program 'xdg-open' was not found on this system."
    );
}

#[tokio::test]
async fn restart_with_login_stops_pressing_after_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().failing("press");
    let mut settings: Settings = settings();
    settings.login = Some(login_sequence());
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    let result = dispatcher
        .dispatch(&stranger(), Command::RestartWithLogin, &reply)
        .await;

    match result {
        Err(Error::RestartAborted { stage, cause, .. }) => {
            assert_eq!(stage, Stage::PressingKeys);
            assert!(matches!(*cause, Error::Os { action: "press", .. }));
        }
        other => panic!("expected restart aborted, got {other:?}"),
    }
    assert_eq!(
        host.calls(),
        vec![
            Call::Stop("Sunderfolk".into()),
            Call::Launch("2414270".into()),
            Call::Press(Key::Enter),
        ]
    );
    assert!(!reply.last().contains("startup sequence complete"));
}

#[tokio::test]
async fn login_commands_need_a_login_target() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    for command in [Command::RestartWithLogin, Command::LoginStatus] {
        let result = dispatcher.dispatch(&owner(), command, &reply).await;
        assert!(matches!(result, Err(Error::NotConfigured)));
    }
    assert!(host.calls().is_empty());
    assert_eq!(reply.last(), "❌ No login target has been configured.");
}

#[tokio::test]
async fn login_status_checks_the_login_target() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default().with_running("sunderfolk");
    let mut settings: Settings = settings();
    settings.login = Some(login_sequence());
    let dispatcher = dispatcher_in(&dir, &host, settings);
    let reply: Recorder = Recorder::default();

    dispatcher
        .dispatch(&stranger(), Command::LoginStatus, &reply)
        .await
        .unwrap();
    assert_eq!(reply.last(), "✅ **Sunderfolk** (`Sunderfolk`) is **running**.");
}

#[tokio::test]
async fn registry_errors_reach_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();
    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();

    let duplicate = dispatcher.dispatch(&owner(), add_valheim(), &reply).await;
    assert!(matches!(duplicate, Err(Error::AlreadyExists(_))));
    assert_eq!(reply.last(), "⚠️ `valheim` already exists.");

    let invalid = Command::Add {
        nickname: "rust".into(),
        app_id: "rust".into(),
        process_name: "RustDedicated".into(),
    };
    let invalid = dispatcher.dispatch(&owner(), invalid, &reply).await;
    assert!(matches!(invalid, Err(Error::InvalidAppId(_))));
    assert_eq!(dispatcher.registry().lock().await.nicknames(), vec![game("valheim")]);

    dispatcher
        .dispatch(&owner(), Command::Remove { nickname: game("VALHEIM") }, &reply)
        .await
        .unwrap();
    assert_eq!(reply.last(), "✅ Removed `valheim` from the list.");

    let missing = dispatcher
        .dispatch(&owner(), Command::Remove { nickname: game("valheim") }, &reply)
        .await;
    assert!(matches!(missing, Err(Error::UnknownGame { .. })));

    dispatcher.dispatch(&owner(), Command::List, &reply).await.unwrap();
    assert_eq!(
        reply.last(),
        "🤷 No games have been added yet. Use `!add` to add one."
    );
}

#[tokio::test]
async fn failed_save_is_reported_and_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let registry: GameRegistry =
        GameRegistry::load(dir.path().join("no-such-dir").join("games.json"));
    let dispatcher = Dispatcher::new(registry, host.clone(), host.clone(), settings());
    let reply: Recorder = Recorder::default();

    let result = dispatcher.dispatch(&owner(), add_valheim(), &reply).await;
    assert!(matches!(result, Err(Error::Persistence(_))));
    assert!(reply
        .last()
        .starts_with("⚠️ Could not save the game list, nothing was changed: cannot write registry to"));
    assert!(dispatcher.registry().lock().await.is_empty());
}

#[tokio::test]
async fn corrupted_registry_file_gives_a_working_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("games.json"), "{\"valheim\": [1, 2").unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    dispatcher.dispatch(&stranger(), Command::List, &reply).await.unwrap();
    assert!(reply.last().starts_with("🤷"));

    dispatcher.dispatch(&owner(), add_valheim(), &reply).await.unwrap();
    let reloaded: GameRegistry = GameRegistry::load(dir.path().join("games.json"));
    assert_eq!(reloaded.nicknames(), vec![game("valheim")]);
}

#[tokio::test]
async fn chat_messages_are_parsed_and_answered() {
    let dir = tempfile::tempdir().unwrap();
    let host: FakeHost = FakeHost::default();
    let dispatcher = dispatcher_in(&dir, &host, settings());
    let reply: Recorder = Recorder::default();

    assert!(!dispatcher.handle_message(&owner(), "good game everyone", &reply).await);
    assert!(!dispatcher.handle_message(&owner(), "!dance", &reply).await);
    assert!(reply.messages().is_empty());

    assert!(dispatcher.handle_message(&owner(), "!start", &reply).await);
    assert_eq!(reply.last(), "ℹ️ Usage: `!start <game>`.");

    assert!(
        dispatcher
            .handle_message(&owner(), "!add_game Valheim 892970 valheim_server.exe", &reply)
            .await
    );
    assert_eq!(
        reply.last(),
        "✅ Added `valheim` (AppID: `892970`, Process: `valheim_server.exe`)."
    );

    assert!(dispatcher.handle_message(&stranger(), "!help", &reply).await);
    assert!(reply.last().contains("`!restart <game>`"));
    assert!(host.calls().is_empty());
}
