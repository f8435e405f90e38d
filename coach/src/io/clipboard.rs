//! System clipboard access through an external command.

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::config::ClipboardConfig;

/// Best-effort text sink. Callers log failures; they are never fatal.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Pipes text into a command such as `pbcopy` or `xclip -selection clipboard`.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClipboard {
    pub fn new(config: &ClipboardConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("clipboard.command must be a non-empty array"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: config.timeout(),
        })
    }
}

impl Clipboard for CommandClipboard {
    #[instrument(skip_all, fields(program = %self.program, bytes = text.len()))]
    fn write_text(&self, text: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn clipboard command {}", self.program))?;

        let Some(mut stdin) = child.stdin.take() else {
            kill_and_reap(&mut child);
            return Err(anyhow!("stdin was not piped"));
        };
        // A command that never reads would block a large write, so the write
        // happens off this thread and the timeout below always applies.
        let payload = text.to_owned();
        let writer = thread::spawn(move || stdin.write_all(payload.as_bytes()));

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "clipboard command timed out, killing"
                );
                kill_and_reap(&mut child);
                // The writer ends once the pipe closes; it is not joined here.
                return Err(anyhow!(
                    "clipboard command timed out after {:?}",
                    self.timeout
                ));
            }
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(err).context("wait for clipboard");
            }
        };
        if !status.success() {
            return Err(anyhow!(
                "clipboard command failed with status {:?}",
                status.code()
            ));
        }
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err).context("write clipboard text"),
            Err(_) => return Err(anyhow!("clipboard writer thread panicked")),
        }
        debug!("text copied to clipboard");
        Ok(())
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(error = %err, "clipboard command already exited");
    }
    if let Err(err) = child.wait() {
        warn!(error = %err, "failed to reap clipboard command");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn clipboard(command: &[&str]) -> CommandClipboard {
        CommandClipboard::new(&ClipboardConfig {
            command: command.iter().map(|s| (*s).to_string()).collect(),
            timeout_secs: 5,
        })
        .expect("clipboard")
    }

    #[test]
    fn writes_text_to_command_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let out = temp.path().join("clip.txt");
        let script = format!("cat > '{}'", out.display());
        clipboard(&["sh", "-c", &script])
            .write_text("Great effort!\n")
            .expect("copy");
        assert_eq!(std::fs::read_to_string(out).expect("read"), "Great effort!\n");
    }

    #[test]
    fn failing_command_is_an_error() {
        let err = clipboard(&["sh", "-c", "cat > /dev/null; exit 3"])
            .write_text("x")
            .unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn missing_command_is_an_error() {
        assert!(clipboard(&["coach-no-such-clipboard-tool"])
            .write_text("x")
            .is_err());
    }

    /// A command that never reads stdin still times out on schedule.
    #[test]
    fn timeout_applies_while_stdin_is_unread() {
        let clipboard = CommandClipboard::new(&ClipboardConfig {
            command: vec!["sh".to_string(), "-c".to_string(), "sleep 4".to_string()],
            timeout_secs: 1,
        })
        .expect("clipboard");
        let text = "x".repeat(512 * 1024);

        let started = Instant::now();
        let err = clipboard.write_text(&text).unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err:#}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn empty_command_is_rejected() {
        let config = ClipboardConfig {
            command: Vec::new(),
            timeout_secs: 5,
        };
        assert!(CommandClipboard::new(&config).is_err());
    }
}
