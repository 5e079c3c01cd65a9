//! Abstractions related to handling processes on the system.
//!
//! The rest of the program only talks to [`ProcessController`]; everything
//! platform specific stays in this module and in [`crate::system`].

/// Storefront URI scheme that runs a game by its app ID.
static URI_PREFIX_RUN_GAME: &'static str = "steam://rungameid/";

#[cfg(windows)]
static EXECUTABLE_TASKKILL: &'static str = "taskkill";
#[cfg(windows)]
static EXECUTABLE_TASKLIST: &'static str = "tasklist";
#[cfg(windows)]
static EXECUTABLE_CMD: &'static str = "cmd";
#[cfg(windows)]
static EXIT_CODE_TASKKILL_NOT_FOUND: i32 = 128;

#[cfg(all(unix, not(target_os = "linux")))]
static EXECUTABLE_PKILL: &'static str = "pkill";
#[cfg(all(unix, not(target_os = "linux")))]
static EXECUTABLE_PGREP: &'static str = "pgrep";
#[cfg(all(unix, not(target_os = "macos")))]
static EXECUTABLE_OPEN: &'static str = "xdg-open";
#[cfg(target_os = "macos")]
static EXECUTABLE_OPEN: &'static str = "open";
/// `pkill` and `pgrep` exit with 1 when no process matched.
#[cfg(all(unix, not(target_os = "linux")))]
static EXIT_CODE_NO_MATCH: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    NotRunning,
}

/// Failures of the OS facilities used for managing processes.
#[derive(Debug)]
pub enum Error {
    /// The external program is not installed or not in `PATH`.
    ToolNotFound { tool: &'static str },

    /// The external program ran but reported a failure.
    ToolFailed {
        tool: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    /// The external program could not be run for some other reason.
    Io {
        tool: &'static str,
        source: std::io::Error,
    },

    ProcessTable(Box<dyn std::error::Error + Send + Sync>),

    /// A matching process was found but could not be killed.
    Kill(Box<dyn std::error::Error + Send + Sync>),

    /// The blocking OS call was cancelled or panicked.
    Interrupted(String),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::ProcessTable(err) | Error::Kill(err) => Some(err.as_ref()),
            Error::ToolNotFound { .. } | Error::ToolFailed { .. } | Error::Interrupted(_) => None,
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ToolNotFound { tool } => {
                write!(f, "required program '{tool}' was not found on this system")
            }
            Error::ToolFailed {
                tool,
                status: Some(code),
                stderr,
            } if stderr.is_empty() => write!(f, "'{tool}' failed with exit status {code}"),
            Error::ToolFailed {
                tool,
                status: Some(code),
                stderr,
            } => write!(f, "'{tool}' failed with exit status {code}: {stderr}"),
            Error::ToolFailed {
                tool, status: None, ..
            } => write!(f, "'{tool}' was terminated by a signal"),
            Error::Io { tool, .. } => write!(f, "cannot run '{tool}'"),
            Error::ProcessTable(_) => write!(f, "cannot read the process table"),
            Error::Kill(_) => write!(f, "cannot kill the process"),
            Error::Interrupted(reason) => write!(f, "OS operation did not complete: {reason}"),
        }
    }
}

/// Operations on game processes.
///
/// Implementations are blocking; callers in async context are expected to
/// run them on a blocking thread.
pub trait ProcessController: Send + Sync + 'static {
    /// Forcefully terminate all processes matching the given name.
    fn stop(&self, process_name: &str) -> Result<StopOutcome, Error>;

    /// Ask the storefront to run the given app. Does not wait for the game.
    fn launch(&self, app_id: &str) -> Result<(), Error>;

    /// Check whether a process matching the given name is in the process
    /// table. Matching is case-insensitive.
    fn is_running(&self, process_name: &str) -> Result<RunState, Error>;
}

/// URI that makes the storefront run the given app.
pub fn launch_uri(app_id: &str) -> String {
    return format!("{URI_PREFIX_RUN_GAME}{app_id}");
}

/// An external program this module delegates to.
pub(crate) struct Tool {
    pub(crate) executable: &'static str,
}

impl Tool {
    pub(crate) fn new(executable: &'static str) -> Self {
        return Self { executable };
    }

    fn command(&self) -> std::process::Command {
        let mut command: std::process::Command = std::process::Command::new(self.executable);
        command.stdin(std::process::Stdio::null());
        hide_console_window(&mut command);
        return command;
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::NotFound {
            return Error::ToolNotFound {
                tool: self.executable,
            };
        }
        return Error::Io {
            tool: self.executable,
            source: err,
        };
    }

    /// Run to completion and capture the output.
    pub(crate) fn output(&self, argv: &[&str]) -> Result<std::process::Output, Error> {
        log::debug!("Running {} {:?}", self.executable, argv);
        let output: std::process::Output = self
            .command()
            .args(argv)
            .output()
            .map_err(|err| self.spawn_error(err))?;
        log::trace!("{} exited with {}", self.executable, output.status);
        return Ok(output);
    }

    /// Run to completion and require success.
    pub(crate) fn run(&self, argv: &[&str]) -> Result<(), Error> {
        let output: std::process::Output = self.output(argv)?;
        if !output.status.success() {
            return Err(self.failure(&output));
        }
        return Ok(());
    }

    /// Start without waiting for the program to finish. The child is reaped
    /// on a background thread.
    pub(crate) fn spawn_detached(&self, argv: &[&str]) -> Result<(), Error> {
        log::debug!("Spawning {} {:?}", self.executable, argv);
        let mut child: std::process::Child = self
            .command()
            .args(argv)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        let executable: &'static str = self.executable;
        std::thread::spawn(move || match child.wait() {
            Ok(status) => log::trace!("{executable} exited with {status}"),
            Err(err) => log::warn!("Cannot wait for {executable} to exit: {err}"),
        });
        return Ok(());
    }

    fn failure(&self, output: &std::process::Output) -> Error {
        return Error::ToolFailed {
            tool: self.executable,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
    }

    /// Interpret a kill tool's output given the exit code it uses for "no
    /// such process".
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    fn stop_outcome(
        &self,
        output: &std::process::Output,
        not_found_code: i32,
    ) -> Result<StopOutcome, Error> {
        return match output.status.code() {
            Some(0) => Ok(StopOutcome::Stopped),
            Some(code) if code == not_found_code => Ok(StopOutcome::NotRunning),
            _ => Err(self.failure(output)),
        };
    }
}

#[cfg(windows)]
fn hide_console_window(command: &mut std::process::Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    std::os::windows::process::CommandExt::creation_flags(command, CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_command: &mut std::process::Command) {}

/// [`ProcessController`] backed by the host OS.
pub struct SystemProcesses;

/// Arguments making `pgrep` match the whole process name, ignoring case.
#[cfg_attr(any(not(unix), target_os = "linux"), allow(dead_code))]
fn pgrep_args(process_name: &str) -> [&str; 4] {
    return ["-i", "-x", "--", process_name];
}

/// [`pgrep_args`] for `pkill`, sending `SIGKILL`.
#[cfg_attr(any(not(unix), target_os = "linux"), allow(dead_code))]
fn pkill_args(process_name: &str) -> [&str; 5] {
    return ["-KILL", "-i", "-x", "--", process_name];
}

#[cfg(target_os = "linux")]
impl ProcessController for SystemProcesses {
    fn stop(&self, process_name: &str) -> Result<StopOutcome, Error> {
        let pids: Vec<u32> = crate::system::find_processes(process_name)
            .map_err(|err| Error::ProcessTable(Box::new(err)))?;
        log::debug!("Killing processes named '{process_name}': {pids:?}");
        let killed: usize =
            crate::system::kill_processes(&pids).map_err(|err| Error::Kill(Box::new(err)))?;
        return match killed {
            0 => Ok(StopOutcome::NotRunning),
            _ => Ok(StopOutcome::Stopped),
        };
    }

    fn launch(&self, app_id: &str) -> Result<(), Error> {
        return Tool::new(EXECUTABLE_OPEN).spawn_detached(&[&launch_uri(app_id)]);
    }

    fn is_running(&self, process_name: &str) -> Result<RunState, Error> {
        let pids: Vec<u32> = crate::system::find_processes(process_name)
            .map_err(|err| Error::ProcessTable(Box::new(err)))?;
        if pids.is_empty() {
            return Ok(RunState::NotRunning);
        }
        log::debug!("Processes named '{process_name}': {pids:?}");
        return Ok(RunState::Running);
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
impl ProcessController for SystemProcesses {
    fn stop(&self, process_name: &str) -> Result<StopOutcome, Error> {
        let pkill: Tool = Tool::new(EXECUTABLE_PKILL);
        let output: std::process::Output = pkill.output(&pkill_args(process_name))?;
        return pkill.stop_outcome(&output, EXIT_CODE_NO_MATCH);
    }

    fn launch(&self, app_id: &str) -> Result<(), Error> {
        return Tool::new(EXECUTABLE_OPEN).spawn_detached(&[&launch_uri(app_id)]);
    }

    fn is_running(&self, process_name: &str) -> Result<RunState, Error> {
        let pgrep: Tool = Tool::new(EXECUTABLE_PGREP);
        let output: std::process::Output = pgrep.output(&pgrep_args(process_name))?;
        return match output.status.code() {
            Some(0) => Ok(RunState::Running),
            Some(code) if code == EXIT_CODE_NO_MATCH => Ok(RunState::NotRunning),
            _ => Err(pgrep.failure(&output)),
        };
    }
}

#[cfg(windows)]
impl ProcessController for SystemProcesses {
    fn stop(&self, process_name: &str) -> Result<StopOutcome, Error> {
        let taskkill: Tool = Tool::new(EXECUTABLE_TASKKILL);
        let output: std::process::Output = taskkill.output(&["/F", "/IM", process_name])?;
        return taskkill.stop_outcome(&output, EXIT_CODE_TASKKILL_NOT_FOUND);
    }

    fn launch(&self, app_id: &str) -> Result<(), Error> {
        return Tool::new(EXECUTABLE_CMD).spawn_detached(&["/C", "start", "", &launch_uri(app_id)]);
    }

    fn is_running(&self, process_name: &str) -> Result<RunState, Error> {
        let tasklist: Tool = Tool::new(EXECUTABLE_TASKLIST);
        let filter: String = format!("IMAGENAME eq {process_name}");
        let output: std::process::Output = tasklist.output(&["/FI", &filter, "/NH"])?;
        if !output.status.success() {
            return Err(tasklist.failure(&output));
        }
        let stdout: String = String::from_utf8_lossy(&output.stdout).to_lowercase();
        return match stdout.contains(&process_name.to_lowercase()) {
            true => Ok(RunState::Running),
            false => Ok(RunState::NotRunning),
        };
    }
}
