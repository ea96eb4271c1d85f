use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{ChallengeError, ChallengeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command that pipes its stdin from `stdin_data`, capturing
/// its output, and kill it if `cancel` fires before it exits.
///
/// A non-zero exit is not an error here: the caller inspects
/// [`CmdOutput::status`] because exit codes carry meaning (e.g.
/// curl's timeout code).
pub fn run_cancellable(
    program: &str,
    args: &[&str],
    stdin_data: &[u8],
    cancel: &CancelToken,
) -> ChallengeResult<CmdOutput> {
    if cancel.is_cancelled() {
        return Err(ChallengeError::Cancelled);
    }

    let mut child = spawn(program, args)?;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(stdin_data) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.into());
        }
    }

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            // The child may have exited between the two checks.
            let _ = child.kill();
            child.wait()?;
            tracing::debug!(command = %format_command(program, args), "killed on cancel");
            return Err(ChallengeError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(CmdOutput {
        status,
        stdout: join(stdout),
        stderr: join(stderr),
    })
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn spawn(program: &str, args: &[&str]) -> ChallengeResult<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ChallengeError::CommandNotFound(program.to_string())
            } else {
                ChallengeError::Io(e)
            }
        })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
