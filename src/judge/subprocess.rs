//! Model-backed judge driven through a child process.
//!
//! The rendered prompt goes to the child's stdin and the judgment is read
//! back from stdout. The whole call gets a hard deadline: past it the
//! process is killed and the call fails with [`JudgeError::Timeout`]. The
//! deadline also covers collecting output, so a grandchild that keeps the
//! pipes open cannot stall the judge.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::extract::parse_judgment;
use super::{Judge, JudgeError, JudgeResult, PromptTemplate};

/// Default deadline for one judgment.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Judge that shells out to a local model runner.
#[derive(Debug, Clone)]
pub struct SubprocessJudge
{
    label: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    prompt: PromptTemplate,
}

impl SubprocessJudge
{
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        prompt: PromptTemplate,
    ) -> Self
    {
        let program = program.into();
        Self { label: program.clone(), program, args, timeout, prompt }
    }

    /// `ollama run <model>`.
    pub fn ollama(
        model: &str,
        timeout: Duration,
        prompt: PromptTemplate,
    ) -> Self
    {
        let mut judge = Self::new("ollama", vec!["run".to_string(), model.to_string()], timeout, prompt);
        judge.label = format!("ollama:{model}");
        judge
    }

    pub fn timeout(&self) -> Duration
    {
        self.timeout
    }
}

impl Judge for SubprocessJudge
{
    fn name(&self) -> &str
    {
        &self.label
    }

    #[instrument(skip_all, fields(judge = %self.label))]
    fn judge(
        &self,
        src: &str,
        trg: &str,
    ) -> Result<JudgeResult, JudgeError>
    {
        let prompt = self
            .prompt
            .render(src, trg);

        let started = Instant::now();
        let raw = run_with_deadline(&self.program, &self.args, prompt.into_bytes(), self.timeout)?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, bytes = raw.len(), "judge replied");

        match parse_judgment(&raw)
        {
            Ok((result, stage)) =>
            {
                debug!(%stage, j = result.score, "judgment extracted");
                Ok(result)
            }
            Err(err) =>
            {
                warn!(error = %err, "judge reply unusable");
                debug!(raw = %raw, "raw judge reply");
                Err(err.into())
            }
        }
    }
}

/// Run `program args..` with `input` on stdin and return stdout.
///
/// Spawn failures and non-zero exits are `Unavailable`. Running past
/// `timeout`, or leaving stdout or stderr open past it, yields `Timeout`.
fn run_with_deadline(
    program: &str,
    args: &[String],
    input: Vec<u8>,
    timeout: Duration,
) -> Result<String, JudgeError>
{
    let deadline = Instant::now() + timeout;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| JudgeError::Unavailable(format!("failed to start `{program}`: {e}")))?;

    // Drain both pipes on detached threads so a chatty child never blocks
    // and a lingering pipe holder never blocks us
    let out_rx = drain_in_background(
        child
            .stdout
            .take(),
    );
    let err_rx = drain_in_background(
        child
            .stderr
            .take(),
    );

    // Feed the prompt; closing stdin signals end of input
    if let Some(mut pipe) = child
        .stdin
        .take()
    {
        thread::spawn(move || {
            // A child that exits early closes its end; that is not our error
            let _ = pipe.write_all(&input);
        });
    }

    let status = wait_until(&mut child, deadline).map_err(|e| match e
    {
        WaitFailure::Deadline => JudgeError::Timeout { after: timeout },
        WaitFailure::Io(e) => JudgeError::Unavailable(format!("failed to wait for `{program}`: {e}")),
    })?;

    let stdout = collect_until(&out_rx, deadline, timeout, "stdout")?;
    let stderr = collect_until(&err_rx, deadline, timeout, "stderr")?;

    if !status.success()
    {
        return Err(JudgeError::Unavailable(format!(
            "`{program}` exited with {status}: {}",
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain_in_background<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>>
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(drain(pipe));
    });
    rx
}

/// Wait for a drained pipe until `deadline`.
fn collect_until(
    rx: &Receiver<Vec<u8>>,
    deadline: Instant,
    timeout: Duration,
    pipe: &str,
) -> Result<Vec<u8>, JudgeError>
{
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
    {
        Ok(buf) => Ok(buf),
        Err(RecvTimeoutError::Timeout) =>
        {
            warn!(pipe, "judge exited but its {pipe} is still held open");
            Err(JudgeError::Timeout { after: timeout })
        }
        // Reader thread died without sending
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
    }
}

enum WaitFailure
{
    Deadline,
    Io(std::io::Error),
}

fn wait_until(
    child: &mut std::process::Child,
    deadline: Instant,
) -> Result<ExitStatus, WaitFailure>
{
    loop
    {
        match child.try_wait()
        {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline =>
            {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitFailure::Deadline);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) =>
            {
                let _ = child.kill();
                return Err(WaitFailure::Io(e));
            }
        }
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8>
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
    {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

#[cfg(all(test, unix))]
mod tests
{
    use super::*;

    fn sh(
        script: &str,
        timeout: Duration,
    ) -> SubprocessJudge
    {
        SubprocessJudge::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            timeout,
            PromptTemplate::default(),
        )
    }

    #[test]
    fn reads_judgment_from_noisy_stdout()
    {
        let judge = sh(
            r#"cat > /dev/null; echo 'Thinking...'; echo '{"final_j_score": 0.8, "risk": 0.1}'; echo done"#,
            Duration::from_secs(10),
        );
        let j = judge.judge("a = 1", "a = 1;").unwrap();
        assert_eq!(j.score, 0.8);
        assert_eq!(j.breakdown["risk"], 0.1);
    }

    #[test]
    fn prompt_reaches_stdin()
    {
        // Echo the prompt back inside a JSON explanation-free reply
        let judge = sh(
            r#"if grep -q 'TARGET CODE' ; then echo '{"J": 1}'; else echo '{"J": 0}'; fi"#,
            Duration::from_secs(10),
        );
        assert_eq!(judge.judge("x", "y").unwrap().score, 1.0);
    }

    #[test]
    fn garbage_reply_is_malformed()
    {
        let judge = sh("cat > /dev/null; echo 'I cannot help with that'", Duration::from_secs(10));
        let err = judge.judge("x", "y").unwrap_err();
        assert!(matches!(err, JudgeError::Malformed(_)));
    }

    #[test]
    fn nonzero_exit_is_unavailable()
    {
        let judge = sh("cat > /dev/null; echo boom >&2; exit 3", Duration::from_secs(10));
        let err = judge.judge("x", "y").unwrap_err();
        assert!(matches!(err, JudgeError::Unavailable(ref m) if m.contains("boom")));
    }

    #[test]
    fn missing_program_is_unavailable()
    {
        let judge = SubprocessJudge::new(
            "imm-no-such-judge-binary",
            Vec::new(),
            Duration::from_secs(1),
            PromptTemplate::default(),
        );
        assert!(matches!(judge.judge("x", "y"), Err(JudgeError::Unavailable(_))));
    }

    #[test]
    fn slow_judge_times_out()
    {
        let judge = sh("sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        let err = judge.judge("x", "y").unwrap_err();
        assert!(matches!(err, JudgeError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn backgrounded_helper_cannot_outlive_the_deadline()
    {
        // The helper inherits stdout, so EOF only arrives when it exits
        let judge = sh(
            r#"cat > /dev/null; (sleep 6 &); echo '{"J": 1}'"#,
            Duration::from_secs(1),
        );
        let started = Instant::now();
        let err = judge.judge("x", "y").unwrap_err();
        assert!(matches!(err, JudgeError::Timeout { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn ollama_label_names_the_model()
    {
        let judge = SubprocessJudge::ollama("mistral", DEFAULT_TIMEOUT, PromptTemplate::default());
        assert_eq!(judge.name(), "ollama:mistral");
        assert_eq!(judge.timeout(), DEFAULT_TIMEOUT);
    }
}
