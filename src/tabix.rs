use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Settings;
use crate::error::PhewasError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Range-restricted access to a sorted, indexed remote resource.
pub trait RangeQuery: Send + Sync {
    /// Body lines of `resource` whose position falls inside `region`.
    fn query(&self, resource: &str, region: &str) -> Result<Vec<String>, PhewasError>;
}

/// Runs the system `tabix` binary. Arguments are passed as a vector, never
/// through a shell, so manifest URLs cannot inject commands.
#[derive(Debug, Clone)]
pub struct SystemTabix {
    program: Option<PathBuf>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

impl SystemTabix {
    pub fn new(settings: &Settings) -> Self {
        let program = settings
            .tabix_path
            .clone()
            .or_else(|| find_in_path("tabix"));
        Self {
            program,
            working_dir: settings.index_dir.clone(),
            timeout: settings.fetch_timeout(),
        }
    }

    pub fn program(&self) -> Result<&Path, PhewasError> {
        self.program
            .as_deref()
            .ok_or_else(|| PhewasError::MissingTool("tabix".to_string()))
    }

    /// Creates the index directory tabix downloads `.tbi` files into.
    pub fn prepare_index_dir(&self) -> Result<(), PhewasError> {
        match &self.working_dir {
            Some(dir) => std::fs::create_dir_all(dir)
                .map_err(|err| PhewasError::IndexDir(dir.clone(), err.to_string())),
            None => Ok(()),
        }
    }

    /// `tabix --version` first line, if the tool runs at all.
    pub fn version(&self) -> Option<String> {
        let program = self.program.as_ref()?;
        let output = Command::new(program).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
    }

    fn spawn(&self, program: &Path, args: &[&str]) -> Result<Child, PhewasError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.spawn().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound if !program.exists() => {
                PhewasError::MissingTool(program.display().to_string())
            }
            io::ErrorKind::NotFound => match &self.working_dir {
                Some(dir) if !dir.is_dir() => {
                    PhewasError::IndexDir(dir.clone(), "directory does not exist".to_string())
                }
                _ => PhewasError::RangeQuery(err.to_string()),
            },
            _ => PhewasError::RangeQuery(err.to_string()),
        })
    }
}

impl RangeQuery for SystemTabix {
    fn query(&self, resource: &str, region: &str) -> Result<Vec<String>, PhewasError> {
        let program = self.program()?;
        let started = Instant::now();
        let mut child = self.spawn(program, &[resource, region])?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PhewasError::FetchTimeout(self.timeout.as_secs()));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => return Err(PhewasError::RangeQuery(err.to_string())),
            }
        };

        let stdout = join(stdout)?;
        let stderr = join(stderr)?;
        debug!(
            region,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tabix finished"
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("tabix exited with {status}")
            } else {
                stderr
            };
            return Err(PhewasError::RangeQuery(message));
        }

        let stdout = String::from_utf8(stdout)
            .map_err(|err| PhewasError::RangeQuery(format!("tabix output is not UTF-8: {err}")))?;
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, PhewasError> {
    handle
        .join()
        .map_err(|_| PhewasError::RangeQuery("output reader panicked".to_string()))?
        .map_err(|err| PhewasError::FetchHttp(format!("broken pipe from tabix: {err}")))
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
