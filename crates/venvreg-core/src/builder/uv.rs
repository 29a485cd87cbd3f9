use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::builder::EnvironmentBuilder;
use crate::config::{BuilderConfig, EnvironmentConfig};
use crate::error::ProvisionError;
use crate::project::ProjectRef;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Builds environments by running `uv venv .venv` (or a configured equivalent)
/// in the project root.
#[derive(Debug, Clone)]
pub struct UvBuilder {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl UvBuilder {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program,
            args,
            timeout,
        }
    }

    pub fn from_config(builder: &BuilderConfig, env: &EnvironmentConfig) -> Self {
        Self::new(
            builder.program.clone(),
            builder.resolved_args(env),
            builder.timeout(),
        )
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn failed(&self, reason: String, output: String) -> ProvisionError {
        ProvisionError::ProvisioningFailed { reason, output }
    }
}

impl EnvironmentBuilder for UvBuilder {
    fn describe(&self) -> String {
        self.argv().join(" ")
    }

    #[instrument(skip(self), fields(cmd = %self.describe()))]
    fn build(&self, project: &ProjectRef) -> Result<(), ProvisionError> {
        info!("running '{}' in {}", self.describe(), project);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(project.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            self.failed(
                format!("failed to start '{}': {e}", self.describe()),
                String::new(),
            )
        })?;

        let captured = wait_with_timeout(&mut child, self.timeout).map_err(|e| {
            self.failed(
                format!("failed to wait for '{}': {e}", self.describe()),
                String::new(),
            )
        })?;
        let output = captured.combined();

        match captured.status {
            Some(status) if status.success() => {
                debug!("'{}' exited successfully", self.describe());
                Ok(())
            }
            Some(status) => {
                warn!("'{}' failed with {}", self.describe(), status);
                Err(self.failed(
                    format!("'{}' exited with {status}", self.describe()),
                    output,
                ))
            }
            None => Err(self.failed(
                format!(
                    "'{}' did not finish within {:?}",
                    self.describe(),
                    self.timeout
                ),
                output,
            )),
        }
    }
}

/// Output of a finished (or killed) child. `status` is `None` when the time limit was hit.
#[derive(Debug)]
struct CapturedOutput {
    stdout: String,
    stderr: String,
    status: Option<ExitStatus>,
}

impl CapturedOutput {
    fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Waits for `child`, killing its process group once `timeout` elapses.
///
/// Both pipes are drained on helper threads while waiting, so a child that
/// writes more than a pipe buffer's worth cannot block forever. After a
/// timeout the readers get a short grace period and are then left behind:
/// anything that escaped the group may still hold the pipes open.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<CapturedOutput> {
    let start = Instant::now();
    let stdout = child.stdout.take().map(StreamCapture::spawn);
    let stderr = child.stderr.take().map(StreamCapture::spawn);

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if start.elapsed() >= timeout {
            kill_process_group(child);
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let deadline = status.is_none().then(|| Instant::now() + DRAIN_GRACE);
    let collect = |capture: Option<StreamCapture>| {
        capture.map(|c| c.finish(deadline)).unwrap_or_default()
    };

    Ok(CapturedOutput {
        stdout: collect(stdout),
        stderr: collect(stderr),
        status,
    })
}

/// A pipe being read on its own thread into a shared buffer.
struct StreamCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: thread::JoinHandle<()>,
}

impl StreamCapture {
    fn spawn<R: Read + Send + 'static>(mut stream: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        });
        Self { buf, handle }
    }

    /// Returns what was read. Without a deadline the reader is joined; with
    /// one it is abandoned if still running when the deadline passes.
    fn finish(self, deadline: Option<Instant>) -> String {
        match deadline {
            None => {
                let _ = self.handle.join();
            }
            Some(deadline) => {
                while !self.handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own group (see `build`), so its id is the group id.
    let pgid = Pid::from_raw(child.id() as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        debug!("killpg({pgid}) failed: {e}; killing the child only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/usr/bin/env sh\n{body}")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().to_string()
    }

    fn builder(program: String, timeout: Duration) -> UvBuilder {
        UvBuilder::new(
            program,
            vec!["venv".to_string(), ".venv".to_string()],
            timeout,
        )
    }

    #[test]
    fn default_config_runs_uv_venv() {
        let uv = UvBuilder::from_config(&BuilderConfig::default(), &EnvironmentConfig::default());
        assert_eq!(uv.argv(), vec!["uv", "venv", ".venv"]);
        assert_eq!(uv.describe(), "uv venv .venv");
    }

    #[test]
    fn runs_in_project_root_with_arguments() {
        let bin = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let script = write_script(
            &bin,
            "fake-uv",
            "echo \"$@\" > invocation.txt\npwd >> invocation.txt\n",
        );

        builder(script, Duration::from_secs(10))
            .build(&ProjectRef::new(project.path()))
            .expect("build should succeed");

        let recorded = fs::read_to_string(project.path().join("invocation.txt")).unwrap();
        let mut lines = recorded.lines();
        assert_eq!(lines.next(), Some("venv .venv"));
        let cwd = Path::new(lines.next().unwrap()).canonicalize().unwrap();
        assert_eq!(cwd, project.path().canonicalize().unwrap());
    }

    #[test]
    fn non_zero_exit_carries_output() {
        let bin = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let script = write_script(
            &bin,
            "fake-uv",
            "echo 'Using CPython 3.12'\necho 'error: no space left' >&2\nexit 2\n",
        );

        let err = builder(script, Duration::from_secs(10))
            .build(&ProjectRef::new(project.path()))
            .expect_err("must fail");
        match err {
            ProvisionError::ProvisioningFailed { reason, output } => {
                assert!(reason.contains("exit status: 2"), "reason: {reason}");
                assert!(output.contains("Using CPython 3.12"));
                assert!(output.contains("error: no space left"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_program_is_provisioning_failure() {
        let project = tempfile::tempdir().unwrap();
        let err = builder(
            "/nonexistent/venvreg-test-uv".to_string(),
            Duration::from_secs(1),
        )
        .build(&ProjectRef::new(project.path()))
        .expect_err("must fail");
        assert!(matches!(err, ProvisionError::ProvisioningFailed { .. }));
        assert!(err.to_string().contains("failed to start"));
    }

    #[test]
    fn slow_builder_is_killed_at_timeout() {
        let bin = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let script = write_script(&bin, "fake-uv", "exec sleep 30\n");

        let started = Instant::now();
        let err = builder(script, Duration::from_millis(200))
            .build(&ProjectRef::new(project.path()))
            .expect_err("must time out");
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(err.to_string().contains("did not finish within 200ms"));
    }

    #[test]
    fn timeout_holds_when_builder_leaves_children_running() {
        let bin = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        // No `exec`: the shell stays as the child and `sleep` inherits its pipes.
        let script = write_script(&bin, "fake-uv", "echo starting\nsleep 8\n");

        let started = Instant::now();
        let err = builder(script, Duration::from_millis(300))
            .build(&ProjectRef::new(project.path()))
            .expect_err("must time out");
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
        match err {
            ProvisionError::ProvisioningFailed { reason, output } => {
                assert!(reason.contains("did not finish within 300ms"), "reason: {reason}");
                assert!(output.contains("starting"), "output: {output}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let bin = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let script = write_script(
            &bin,
            "fake-uv",
            "i=0\nwhile [ $i -lt 4000 ]; do echo \"resolving package number $i of many\"; i=$((i+1)); done\n",
        );

        builder(script, Duration::from_secs(20))
            .build(&ProjectRef::new(project.path()))
            .expect("chatty build should still succeed");
    }
}
