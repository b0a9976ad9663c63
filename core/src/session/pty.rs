//! Session Process Manager
//!
//! Owns the subordinate process bound to a fixed-size pseudo-terminal. A
//! dedicated reader thread pulls raw chunks off the master side, runs each
//! through the stream classifier in arrival order and appends the result to
//! the Output Log. That thread is the log's only writer.

use super::classifier::StreamClassifier;
use super::log::SharedOutputLog;
use super::{SessionState, SessionTransport};
use crate::config::SessionConfig;
use crate::error::{AniError, Result};
use crate::event_bus::{CoreEvent, EventBus};
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use anyhow::Context;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;

const READ_BUFFER_SIZE: usize = 4096;

struct LiveSession {
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    // Held so the pseudo-terminal stays open for the life of the session
    _master: Box<dyn MasterPty + Send>,
}

pub struct SessionManager {
    live: Arc<Mutex<Option<LiveSession>>>,
    state: Arc<Mutex<SessionState>>,
    pid: Option<u32>,
    events: EventBus,
}

impl SessionManager {
    /// Start the subordinate process and its reader thread.
    ///
    /// On failure nothing is left running and the caller should treat the
    /// session as permanently absent.
    pub fn spawn(
        config: &SessionConfig,
        log: SharedOutputLog,
        classifier: Arc<StreamClassifier>,
        events: EventBus,
    ) -> Result<Self> {
        debug_log!(
            "SessionManager::spawn: {} {:?} ({}x{})",
            config.command,
            config.args,
            config.cols,
            config.rows
        );
        let state = Arc::new(Mutex::new(SessionState::Starting));

        let (live, pid, reader) = open_session(config).map_err(|e| {
            error_log!("Session failed to start: {:#}", e);
            AniError::Spawn {
                message: format!("{:#}", e),
            }
        })?;

        let live = Arc::new(Mutex::new(Some(live)));
        *state.lock() = SessionState::Running;
        events.publish(CoreEvent::SessionStarted { pid });
        info_log!("Session started: {} (pid {:?})", config.command, pid);

        spawn_reader(
            reader,
            log,
            classifier,
            live.clone(),
            state.clone(),
            events.clone(),
        );

        Ok(Self {
            live,
            state,
            pid,
            events,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

fn open_session(
    config: &SessionConfig,
) -> anyhow::Result<(LiveSession, Option<u32>, Box<dyn Read + Send>)> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .context("Failed to open PTY")?;

    // CommandBuilder starts from a copy of this process's environment
    let mut cmd = CommandBuilder::new(&config.command);
    cmd.args(&config.args);
    match &config.cwd {
        Some(cwd) => cmd.cwd(cwd),
        None => {
            if let Ok(cwd) = std::env::current_dir() {
                cmd.cwd(cwd);
            }
        }
    }
    #[cfg(unix)]
    cmd.env("TERM", "xterm-256color");

    let child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("Failed to spawn {}", config.command))?;
    // The child holds its own copy of the slave side
    drop(pair.slave);

    let pid = child.process_id();
    let reader = pair
        .master
        .try_clone_reader()
        .context("Failed to clone PTY reader")?;
    let writer = pair
        .master
        .take_writer()
        .context("Failed to take PTY writer")?;

    Ok((
        LiveSession {
            writer,
            child,
            _master: pair.master,
        },
        pid,
        reader,
    ))
}

fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    log: SharedOutputLog,
    classifier: Arc<StreamClassifier>,
    live: Arc<Mutex<Option<LiveSession>>>,
    state: Arc<Mutex<SessionState>>,
    events: EventBus,
) {
    thread::spawn(move || {
        debug_log!("PTY reader thread started");
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    debug_log!("PTY reader: EOF reached");
                    break;
                }
                Ok(n) => {
                    let lines = classifier.classify(&buffer[..n]);
                    trace_log!("PTY reader: {} bytes -> {} lines", n, lines.len());
                    let appended = log.append(lines);
                    if !appended.is_empty() {
                        events.publish(CoreEvent::LinesAppended { lines: appended });
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EIO here usually means the child closed its side
                    debug_log!("PTY reader stopped: {}", e);
                    break;
                }
            }
        }

        let code = live.lock().take().and_then(|mut session| {
            match session.child.try_wait() {
                Ok(Some(status)) => Some(status.exit_code()),
                Ok(None) => {
                    let _ = session.child.kill();
                    None
                }
                Err(e) => {
                    warn_log!("Could not collect session exit status: {}", e);
                    None
                }
            }
        });

        let was_running = {
            let mut state = state.lock();
            let was_running = *state != SessionState::Exited;
            *state = SessionState::Exited;
            was_running
        };
        if was_running {
            warn_log!("Session exited (code {:?})", code);
            events.publish(CoreEvent::SessionExited { code });
        }
    });
}

impl SessionTransport for SessionManager {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        trace_log!("SessionManager::write: {} bytes", bytes.len());
        let mut live = self.live.lock();
        let session = live.as_mut().ok_or(AniError::SessionUnavailable)?;
        // The child can die before the reader thread notices EOF
        session
            .writer
            .write_all(bytes)
            .and_then(|_| session.writer.flush())
            .map_err(|e| {
                warn_log!("Session write failed: {}", e);
                AniError::SessionUnavailable
            })
    }

    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn kill(&self) {
        let taken = self.live.lock().take();
        if let Some(mut session) = taken {
            if let Err(e) = session.child.kill() {
                debug_log!("Session kill: {}", e);
            }
            info_log!("Session killed");
        }

        let mut state = self.state.lock();
        if *state != SessionState::Exited {
            *state = SessionState::Exited;
            self.events.publish(CoreEvent::SessionExited { code: None });
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_of_missing_program_reports_spawn_error() {
        let config = SessionConfig {
            command: "ani-test-definitely-not-a-real-program".to_string(),
            ..SessionConfig::default()
        };
        let result = SessionManager::spawn(
            &config,
            SharedOutputLog::new(10, 5),
            Arc::new(StreamClassifier::default()),
            EventBus::default(),
        );

        match result {
            Err(AniError::Spawn { message }) => assert!(!message.is_empty()),
            Err(other) => panic!("expected Spawn, got {:?}", other),
            Ok(_) => panic!("spawning a missing program should fail"),
        }
    }
}
