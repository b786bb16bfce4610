//! [`ContainerRuntime`] backed by the `docker` CLI.

use std::cell::RefCell;
use std::collections::HashSet;

use ferry_config::RegistryAuth;
use ferry_core::command_stream::{is_tool_installed, run_command, LineStream};
use ferry_core::error::{FerryError, Result};
use tracing::{debug, info};

use crate::runtime::{ContainerRuntime, PushEvent, PushEvents};

/// Prefixes of `docker push` output lines that report a failed push.
const PUSH_ERROR_PREFIXES: &[&str] = &[
    "error",
    "denied:",
    "unauthorized:",
    "toomanyrequests:",
    "received unexpected http status",
    "unknown blob",
];

pub struct DockerCli {
    program: String,
    logged_in: RefCell<HashSet<String>>,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            logged_in: RefCell::new(HashSet::new()),
        }
    }

    /// Fail early when the CLI is missing or the daemon is unreachable.
    pub fn ensure_available(&self) -> Result<()> {
        if !is_tool_installed(&self.program) {
            return Err(FerryError::Config(format!(
                "{} is not installed or not in PATH",
                self.program
            )));
        }
        run_command(&self.program, &["version", "--format", "{{.Server.Version}}"], None)
            .map(|version| debug!(version = %version, "Docker daemon is available"))
            .map_err(|e| FerryError::Config(format!("Docker daemon is not running: {}", e)))
    }

    fn login(&self, registry: &str, auth: &RegistryAuth) -> Result<()> {
        if self.logged_in.borrow().contains(registry) {
            return Ok(());
        }
        info!(registry = %registry, user = %auth.username, "Logging in to target registry");
        run_command(
            &self.program,
            &["login", "--username", auth.username.as_str(), "--password-stdin", registry],
            Some(auth.password.as_bytes()),
        )
        .map_err(|e| FerryError::Transfer(format!("login to {} failed: {}", registry, e.output)))?;
        self.logged_in.borrow_mut().insert(registry.to_string());
        Ok(())
    }
}

impl ContainerRuntime for DockerCli {
    fn pull(&self, reference: &str) -> Result<()> {
        run_command(&self.program, &["pull", "--quiet", reference], None)
            .map(|_| ())
            .map_err(|e| FerryError::Transfer(format!("pull {}: {}", reference, e.output)))
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        run_command(&self.program, &["tag", source, target], None)
            .map(|_| ())
            .map_err(|e| FerryError::Local(format!("tag {} {}: {}", source, target, e.output)))
    }

    fn push<'a>(&'a self, reference: &str, auth: &RegistryAuth) -> Result<PushEvents<'a>> {
        let registry = registry_of(reference);
        self.login(registry, auth)?;

        let stream = LineStream::spawn(&self.program, &["push", reference])
            .map_err(|e| FerryError::Transfer(format!("push {}: {}", reference, e)))?;
        Ok(Box::new(DockerPushStream {
            cli: self,
            registry: registry.to_string(),
            stream: Some(stream),
        }))
    }

    fn remove_image(&self, reference: &str) -> Result<()> {
        run_command(&self.program, &["image", "rm", reference], None)
            .map(|_| ())
            .map_err(|e| FerryError::Local(format!("remove {}: {}", reference, e.output)))
    }
}

/// Output of a running `docker push`, one event per line.
struct DockerPushStream<'a> {
    cli: &'a DockerCli,
    registry: String,
    stream: Option<LineStream>,
}

impl DockerPushStream<'_> {
    fn fail(&mut self, message: String) -> PushEvent {
        // Credentials may have been rotated; log in again on the next attempt.
        if message.to_ascii_lowercase().contains("unauthorized") {
            self.cli.logged_in.borrow_mut().remove(&self.registry);
        }
        PushEvent::Failure(message)
    }
}

impl Iterator for DockerPushStream<'_> {
    type Item = PushEvent;

    fn next(&mut self) -> Option<PushEvent> {
        let stream = self.stream.as_mut()?;
        match stream.next_line() {
            Ok(Some(line)) => match classify_push_line(&line) {
                PushEvent::Failure(message) => Some(self.fail(message)),
                event => Some(event),
            },
            Ok(None) => {
                let stream = self.stream.take()?;
                let event = match stream.finish() {
                    Ok(Ok(())) => PushEvent::Done,
                    Ok(Err(failure)) => self.fail(failure.to_string()),
                    Err(e) => self.fail(e.to_string()),
                };
                Some(event)
            }
            Err(e) => {
                let message = format!("reading push output: {}", e);
                Some(self.fail(message))
            }
        }
    }
}

impl Drop for DockerPushStream<'_> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.kill() {
                debug!(command = %stream.command(), error = %e, "Failed to stop abandoned push");
            }
        }
    }
}

/// Classify one line of `docker push` output.
pub fn classify_push_line(line: &str) -> PushEvent {
    let trimmed = line.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if PUSH_ERROR_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix)) {
        PushEvent::Failure(trimmed.replace('\n', " "))
    } else {
        PushEvent::Progress(trimmed.to_string())
    }
}

/// Registry host of a fully-qualified image reference.
pub fn registry_of(reference: &str) -> &str {
    reference.split('/').next().unwrap_or(reference)
}
