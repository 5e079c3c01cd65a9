//! Querying and signalling the process table through `/proc`.

/// Longest process name the kernel keeps in `comm`.
static COMM_LENGTH_MAX: usize = 15;

#[derive(Debug)]
pub enum Error {
    ProcFsError(procfs::ProcError),
    Signal { pid: u32, errno: nix::errno::Errno },
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProcFsError(err) => Some(err),
            Error::Signal { errno, .. } => Some(errno),
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ProcFsError(_) => write!(f, "dependency 'procfs' failed"),
            Error::Signal { pid, .. } => write!(f, "cannot kill process {pid}"),
        }
    }
}

/// IDs of the live processes named `name`, ignoring case. This process
/// itself is never included.
///
/// A process is named by its `comm`, by the file name of its executable and
/// by the file name of its `argv[0]`. The rest of the command line is not
/// looked at, so e.g. `tail -f valheim_server.log` is not `valheim_server`.
pub fn find_processes(name: &str) -> Result<Vec<u32>, Error> {
    let needle: String = name.to_lowercase();
    let own_pid: i32 = std::process::id() as i32;

    let processes: procfs::process::ProcessesIter =
        procfs::process::all_processes().map_err(Error::ProcFsError)?;

    let mut matching_pids: Vec<u32> = Vec::new();
    for proc in processes {
        // Processes come and go while iterating
        let Ok(proc) = proc else {
            continue;
        };
        if proc.pid() == own_pid {
            continue;
        }
        let Ok(stat) = proc.stat() else {
            continue;
        };
        // Exited, waiting to be reaped
        if stat.state == 'Z' {
            continue;
        }
        let exe: Option<String> = proc
            .exe()
            .ok()
            .map(|path: std::path::PathBuf| path.to_string_lossy().into_owned());
        let argv0: Option<String> = proc
            .cmdline()
            .ok()
            .and_then(|cmdline: Vec<String>| cmdline.into_iter().next());
        if matches_process_name(&needle, &stat.comm, exe.as_deref(), argv0.as_deref()) {
            matching_pids.push(stat.pid as u32);
        }
    }

    return Ok(matching_pids);
}

/// Send `SIGKILL` to the given processes. Returns how many were killed;
/// processes that exited in the meantime are not counted.
pub fn kill_processes(pids: &[u32]) -> Result<usize, Error> {
    let mut killed: usize = 0;
    for &pid in pids {
        let target: nix::unistd::Pid = nix::unistd::Pid::from_raw(pid as i32);
        match nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGKILL) {
            Ok(()) => killed = killed + 1,
            Err(nix::errno::Errno::ESRCH) => log::debug!("Process {pid} exited before SIGKILL"),
            Err(errno) => return Err(Error::Signal { pid, errno }),
        }
    }
    return Ok(killed);
}

/// Last component of a Unix or Windows style path.
fn file_name(path: &str) -> &str {
    return match path.rfind(|c: char| c == '/' || c == '\\') {
        Some(i) => &path[i + 1..],
        None => path,
    };
}

fn matches_process_name(
    needle_lowercase: &str,
    comm: &str,
    exe: Option<&str>,
    argv0: Option<&str>,
) -> bool {
    if needle_lowercase.is_empty() {
        return false;
    }

    let comm: String = comm.to_lowercase();
    // The kernel truncates `comm`
    let truncated: Option<&str> = needle_lowercase.get(..COMM_LENGTH_MAX);
    if comm == needle_lowercase || truncated == Some(comm.as_str()) {
        return true;
    }

    return [exe, argv0]
        .into_iter()
        .flatten()
        .any(|path: &str| file_name(path).to_lowercase() == needle_lowercase);
}
