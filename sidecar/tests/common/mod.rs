//! Shared utilities for the sidecar E2E tests
//!
//! Each test gets its own temporary directory for sockets, and the sidecar
//! runs with a clean `COSI_*` environment so the host's settings never leak
//! into a test.
//!
//! ```rust,ignore
//! let run = SidecarBuilder::new()
//!     .cosi_address("unix:///tmp/x.sock")
//!     .run(&[]);
//! assert_eq!(run.code, 0);
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Upper bound for a single sidecar run.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(30);

const COSI_ENV: &[&str] = &[
    "COSI_ADDRESS",
    "COSI_LISTEN_ADDRESS",
    "COSI_NO_MOCK_DRIVER",
    "COSI_DRIVER_NAME",
    "COSI_DRIVER_VERSION",
    "COSI_BUCKET_NAME",
    "COSI_LOG_LEVEL",
    "RUST_LOG",
];

pub fn sidecar_binary() -> &'static str {
    env!("CARGO_BIN_EXE_cosi-driver-sidecar")
}

/// Outcome of one sidecar run
#[derive(Debug)]
pub struct SidecarRun {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

/// Temporary directory holding the sockets of one test
pub struct SocketDir {
    dir: TempDir,
}

impl SocketDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("unix://{}", self.path(name).display())
    }
}

/// Builder for sidecar invocations
#[derive(Default)]
pub struct SidecarBuilder {
    env: Vec<(String, String)>,
}

impl SidecarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cosi_address(self, address: &str) -> Self {
        self.env("COSI_ADDRESS", address)
    }

    pub fn listen_address(self, address: &str) -> Self {
        self.env("COSI_LISTEN_ADDRESS", address)
    }

    pub fn log_level(self, level: &str) -> Self {
        self.env("COSI_LOG_LEVEL", level)
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Spawn the sidecar without waiting for it.
    pub fn spawn(self, args: &[&str]) -> Child {
        let mut cmd = Command::new(sidecar_binary());
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for var in COSI_ENV {
            cmd.env_remove(var);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.spawn().expect("Failed to start sidecar")
    }

    /// Run the sidecar to completion.
    ///
    /// A run exceeding [`RUN_TIMEOUT`] is killed and reported with code -1.
    pub fn run(self, args: &[&str]) -> SidecarRun {
        wait_with_timeout(self.spawn(args), RUN_TIMEOUT)
    }
}

/// Wait for `child` to exit, killing it after `timeout`.
///
/// Output is drained on reader threads so a chatty sidecar never blocks on a
/// full pipe.
pub fn wait_with_timeout(mut child: Child, timeout: Duration) -> SidecarRun {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let code = loop {
        if let Some(status) = child.try_wait().expect("Failed to poll sidecar") {
            break status.code().unwrap_or(-1);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break -1;
        }
        thread::sleep(Duration::from_millis(20));
    };

    SidecarRun {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        code,
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut output = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut output);
        }
        output
    })
}
