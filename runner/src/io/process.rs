//! Child process execution with stdin feed and a combined output log.
//!
//! stdout and stderr are drained concurrently into one log file so a chatty
//! child can never deadlock on a full pipe. There is no timeout: the caller
//! blocks until the child exits.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;

use thiserror::Error;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {action}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    fn io(action: impl Into<String>, source: io::Error) -> Self {
        ProcessError::Io {
            action: action.into(),
            source,
        }
    }
}

/// Run `cmd`, write `stdin` to it, and copy stdout/stderr into `log_path`.
///
/// The log file is truncated first. Returns once the child has exited and
/// both streams are fully drained.
#[instrument(skip_all, fields(log = %log_path.display()))]
pub fn run_with_log(
    mut cmd: Command,
    stdin: &[u8],
    log_path: &Path,
) -> Result<ExitStatus, ProcessError> {
    let log = File::create(log_path)
        .map_err(|e| ProcessError::io(format!("create log file {}", log_path.display()), e))?;
    let log = Mutex::new(log);

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let program = cmd.get_program().to_string_lossy().to_string();

    debug!(program = %program, "spawning child process");
    let mut child = cmd.spawn().map_err(|source| {
        error!(err = %source, program = %program, "failed to spawn command");
        ProcessError::Spawn {
            program: program.clone(),
            source,
        }
    })?;

    let child_stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let log = &log;
    let (stdin_result, stdout_result, stderr_result) = thread::scope(|scope| {
        let writer = scope.spawn(move || feed_stdin(child_stdin, stdin));
        let out_reader = scope.spawn(move || copy_to_log(stdout, log));
        let err_reader = scope.spawn(move || copy_to_log(stderr, log));
        (join_io(writer), join_io(out_reader), join_io(err_reader))
    });

    let status = child
        .wait()
        .map_err(|e| ProcessError::io("wait for child process", e))?;
    stdin_result.map_err(|e| ProcessError::io("write child stdin", e))?;
    stdout_result.map_err(|e| ProcessError::io("copy child stdout", e))?;
    stderr_result.map_err(|e| ProcessError::io("copy child stderr", e))?;

    debug!(exit_code = ?status.code(), "command finished");
    Ok(status)
}

fn feed_stdin(stdin: Option<std::process::ChildStdin>, input: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(input) {
        // An agent may exit without reading its prompt.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            warn!("child closed stdin before the prompt was fully written");
            Ok(())
        }
        other => other,
    }
}

fn copy_to_log<R: Read>(reader: Option<R>, log: &Mutex<File>) -> io::Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        let mut file = log
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        file.write_all(&chunk[..n])?;
    }
}

fn join_io(handle: thread::ScopedJoinHandle<'_, io::Result<()>>) -> io::Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("output thread panicked")),
    }
}
