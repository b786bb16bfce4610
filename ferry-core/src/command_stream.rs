// Standard library
use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader};
use std::thread;
use std::time::Duration;

// External crates
use duct::{cmd, ReaderHandle};
use tracing::debug;
use which::which;

/// A finished command that exited unsuccessfully.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub command: String,
    pub code: Option<i32>,
    pub output: String,
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "`{}` exited with {}: {}", self.command, code, self.output),
            None => write!(f, "`{}` was terminated: {}", self.command, self.output),
        }
    }
}

pub fn render_command<A: AsRef<OsStr>>(program: &str, args: &[A]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

/// Run a command to completion, capturing stdout and stderr together.
///
/// Spawn errors (binary missing) and non-zero exits are both reported as
/// `CommandFailure`; callers decide how to classify them.
pub fn run_command<A: AsRef<OsStr>>(
    program: &str,
    args: &[A],
    stdin: Option<&[u8]>,
) -> Result<String, CommandFailure> {
    let full_command = render_command(program, args);
    debug!(command = %full_command, "Running command");

    let mut expression = cmd(program, args).stderr_to_stdout().stdout_capture().unchecked();
    if let Some(input) = stdin {
        expression = expression.stdin_bytes(input.to_vec());
    }

    let output = expression.run().map_err(|e| CommandFailure {
        command: full_command.clone(),
        code: None,
        output: e.to_string(),
    })?;

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() {
        Ok(text)
    } else {
        Err(CommandFailure {
            command: full_command,
            code: output.status.code(),
            output: last_lines(&text, 20),
        })
    }
}

/// Line-by-line view of a running command's merged stdout/stderr.
pub struct LineStream {
    command: String,
    reader: BufReader<ReaderHandle>,
    last_line: Option<String>,
}

impl LineStream {
    pub fn spawn<A: AsRef<OsStr>>(program: &str, args: &[A]) -> io::Result<Self> {
        let command = render_command(program, args);
        debug!(command = %command, "Streaming command");
        let reader = cmd(program, args).stderr_to_stdout().unchecked().reader()?;
        Ok(Self {
            command,
            reader: BufReader::new(reader),
            last_line: None,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Next output line, or `None` once the child closed its output.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        if !line.trim().is_empty() {
            self.last_line = Some(line.clone());
        }
        Ok(Some(line))
    }

    pub fn kill(&self) -> io::Result<()> {
        self.reader.get_ref().kill()
    }

    /// Drain remaining output and wait for the child to exit.
    pub fn finish(mut self) -> io::Result<Result<(), CommandFailure>> {
        while self.next_line()?.is_some() {}

        let handle = self.reader.get_ref();
        let status = loop {
            if let Some(output) = handle.try_wait()? {
                break output.status;
            }
            thread::sleep(Duration::from_millis(50));
        };

        if status.success() {
            Ok(Ok(()))
        } else {
            Ok(Err(CommandFailure {
                command: self.command,
                code: status.code(),
                output: self.last_line.unwrap_or_default(),
            }))
        }
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}
