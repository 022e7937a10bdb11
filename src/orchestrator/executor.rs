//! Step execution: typed external invocations with captured output.
//!
//! Every external tool the orchestrator drives (package manager, build
//! backend, downloads of dependency sources) is described as a [`Step`] and
//! executed through a [`StepRunner`]. The production runner streams output
//! into the log while the child runs; [`RecordingRunner`] records steps and
//! answers them in memory so phases can be exercised without real tools.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::StepError;

/// One external invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Step {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Step {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, vars: &[(String, String)]) -> Self {
        self.env.extend(vars.iter().cloned());
        self
    }

    /// Final path component of the program (`gbuild`, `apt-get`, ...).
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Whether any argument equals `value`.
    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a == value)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a step that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn success() -> Self {
        StepOutput {
            code: Some(0),
            ..StepOutput::default()
        }
    }

    pub fn success_with_stdout(stdout: impl Into<String>) -> Self {
        StepOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        StepOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into a [`StepError::Failed`].
    pub fn into_result(self, step: &Step) -> Result<StepOutput, StepError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(StepError::Failed {
                cmd: step.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes steps. Implementations must run one step at a time.
#[allow(async_fn_in_trait)]
pub trait StepRunner {
    /// Run a step to completion. A non-zero exit is returned as output, not as
    /// an error; only failure to start the program is an error.
    async fn run(&self, step: &Step) -> Result<StepOutput, StepError>;
}

/// Run a step and fail on non-zero exit.
pub async fn check_call<R: StepRunner>(runner: &R, step: Step) -> Result<StepOutput, StepError> {
    log::info!("[Exec] $ {}", step);
    let output = runner.run(&step).await?;
    output.into_result(&step)
}

/// Production runner backed by `tokio::process`.
///
/// stdout lines are logged at info level, stderr lines at warn level, both
/// tagged with the program name, while being captured for the caller.
#[derive(Clone, Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }
}

async fn drain_lines<S>(stream: Option<S>, tag: String, is_stderr: bool) -> String
where
    S: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stream) = stream else {
        return captured;
    };

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if is_stderr {
                    log::warn!("[{}] {}", tag, line);
                } else {
                    log::info!("[{}] {}", tag, line);
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("[{}] output stream error: {}", tag, e);
                break;
            }
        }
    }
    captured
}

impl StepRunner for SystemRunner {
    async fn run(&self, step: &Step) -> Result<StepOutput, StepError> {
        let mut command = Command::new(&step.program);
        command
            .args(&step.args)
            .envs(step.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &step.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| StepError::Spawn {
            cmd: step.to_string(),
            source,
        })?;

        let tag = step.program_name();
        let stdout = drain_lines(child.stdout.take(), tag.clone(), false);
        let stderr = drain_lines(child.stderr.take(), tag, true);
        let (stdout, stderr, status) = tokio::join!(stdout, stderr, child.wait());

        let status = status.map_err(|source| StepError::Spawn {
            cmd: step.to_string(),
            source,
        })?;

        Ok(StepOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

type Handler = dyn Fn(&Step) -> StepOutput + Send + Sync;

/// In-memory runner that records every step.
///
/// The handler decides each step's outcome and may create files to simulate
/// the backend's output. The default handler succeeds with empty output.
#[derive(Clone)]
pub struct RecordingRunner {
    steps: Arc<Mutex<Vec<Step>>>,
    handler: Arc<Handler>,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        RecordingRunner::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        RecordingRunner::with_handler(|_| StepOutput::success())
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Step) -> StepOutput + Send + Sync + 'static,
    {
        RecordingRunner {
            steps: Arc::new(Mutex::new(Vec::new())),
            handler: Arc::new(handler),
        }
    }

    /// All steps run so far, in order.
    pub fn steps(&self) -> Vec<Step> {
        self.steps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Steps whose program name equals `name`.
    pub fn steps_named(&self, name: &str) -> Vec<Step> {
        self.steps()
            .into_iter()
            .filter(|s| s.program_name() == name)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("steps", &self.count())
            .finish()
    }
}

impl StepRunner for RecordingRunner {
    async fn run(&self, step: &Step) -> Result<StepOutput, StepError> {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(step.clone());
        }
        Ok((self.handler)(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display_quotes_spaces() {
        let step = Step::new("/w/bin/gsign").arg("-p").arg("gpg --detach-sign");
        assert_eq!(step.to_string(), "/w/bin/gsign -p 'gpg --detach-sign'");
        assert_eq!(step.program_name(), "gsign");
    }

    #[test]
    fn test_failed_output_becomes_error() {
        let step = Step::new("make");
        let err = StepOutput::failure(2, "boom").into_result(&step).unwrap_err();
        assert_eq!(err.exit_code(), Some(2));
    }

    #[tokio::test]
    async fn test_recording_runner_records_in_order() {
        let runner = RecordingRunner::new();
        check_call(&runner, Step::new("a")).await.unwrap();
        check_call(&runner, Step::new("b").arg("x")).await.unwrap();
        let names: Vec<_> = runner.steps().iter().map(|s| s.program_name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(runner.steps_named("b")[0].has_arg("x"));
    }

    #[tokio::test]
    async fn test_check_call_fails_on_nonzero() {
        let runner = RecordingRunner::with_handler(|step| {
            if step.program_name() == "false" {
                StepOutput::failure(1, "")
            } else {
                StepOutput::success()
            }
        });
        assert!(check_call(&runner, Step::new("true")).await.is_ok());
        assert!(check_call(&runner, Step::new("false")).await.is_err());
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&Step::new("sh").arg("-c").arg("echo out; echo err 1>&2; exit 3"))
            .await
            .expect("sh should spawn");
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_system_runner_spawn_error() {
        let runner = SystemRunner::new();
        let result = runner
            .run(&Step::new("definitely_not_a_real_command_12345"))
            .await;
        assert!(matches!(result, Err(StepError::Spawn { .. })));
    }
}
