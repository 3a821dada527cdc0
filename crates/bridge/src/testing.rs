//! Scripted `CommandRunner` for tests.
//!
//! Records every invocation and the highest number of calls observed in flight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::locator::BridgeLocator;
use crate::runner::{CommandOutput, CommandRunner, RunError};

type Handler = dyn Fn(&[String]) -> Result<CommandOutput, RunError> + Send + Sync;

/// Successful exit with the given stdout
pub fn ok(stdout: &str) -> Result<CommandOutput, RunError> {
    exit(0, stdout, "")
}

/// Exit with an arbitrary code and streams
pub fn exit(code: i32, stdout: &str, stderr: &str) -> Result<CommandOutput, RunError> {
    Ok(CommandOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

/// Locator that resolves to a fixed fake path without touching the filesystem
pub fn fake_locator() -> BridgeLocator {
    BridgeLocator::fixed(PathBuf::from("/fake/platform-tools/adb"))
}

/// Locator that never finds anything
pub fn missing_locator() -> BridgeLocator {
    BridgeLocator::with_strategies(None, None, Vec::new(), None)
}

struct Running<'a>(&'a AtomicUsize);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runner answering from a closure over the argument list
pub struct ScriptedRunner {
    handler: Box<Handler>,
    delays: Vec<(String, Duration)>,
    calls: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    installs_in_flight: AtomicUsize,
    max_installs_in_flight: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[String]) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            installs_in_flight: AtomicUsize::new(0),
            max_installs_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering any call containing `arg`
    pub fn with_delay(mut self, arg: &str, delay: Duration) -> Self {
        self.delays.push((arg.to_string(), delay));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls whose arguments contain `arg`
    pub fn count_calls_with(&self, arg: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.iter().any(|a| a == arg))
            .count()
    }

    /// Calls currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn max_install_concurrency(&self) -> usize {
        self.max_installs_in_flight.load(Ordering::SeqCst)
    }
}

fn enter<'a>(counter: &'a AtomicUsize, max: &AtomicUsize) -> Running<'a> {
    let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
    max.fetch_max(now, Ordering::SeqCst);
    Running(counter)
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        _program: &Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        self.calls.lock().push(args.to_vec());

        let _running = enter(&self.in_flight, &self.max_in_flight);
        let _installing = args
            .iter()
            .any(|a| a == "install")
            .then(|| enter(&self.installs_in_flight, &self.max_installs_in_flight));

        for (arg, delay) in &self.delays {
            if args.iter().any(|a| a == arg) {
                tokio::time::sleep(*delay).await;
            }
        }

        (self.handler)(args)
    }
}
