use crate::prelude::*;

pub mod cache;

use crate::device::Device;
use crate::snapshot::InverterSnapshot;
use crate::voltronic::{Setting, SettingCommand};
use cache::{CachedResponse, ResponseCache};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound for one full polling cycle across every inverter.
pub const CYCLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct PollStats {
    cycles: u64,
    cycles_timed_out: u64,
    commands_sent: u64,
    command_errors: u64,
    writes_sent: u64,
    write_errors: u64,
    // last error seen per inverter
    last_errors: HashMap<String, String>,
}

impl PollStats {
    pub fn print_summary(&self) {
        info!("Polling Statistics:");
        info!("  Cycles: {}", self.cycles);
        info!("  Cycles timed out: {}", self.cycles_timed_out);
        info!("  Commands:");
        info!("    Sent: {}", self.commands_sent);
        info!("    Errors: {}", self.command_errors);
        info!("  Writes:");
        info!("    Sent: {}", self.writes_sent);
        info!("    Errors: {}", self.write_errors);
        if !self.last_errors.is_empty() {
            info!("  Last error by inverter:");
            for (name, message) in &self.last_errors {
                info!("    {}: {}", name, message);
            }
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn command_errors(&self) -> u64 {
        self.command_errors
    }
}

struct Target {
    inverter: config::Inverter,
    device: Arc<Device>,
}

/// Polls every enabled inverter on a fixed cadence and keeps the last good
/// response per command. Every exchange, polled or requested, goes through
/// one shared `CommandQueue`.
#[derive(Clone)]
pub struct Coordinator {
    config: ConfigWrapper,
    queue: CommandQueue,
    targets: Arc<Vec<Target>>,
    cache: ResponseCache,
    shutdown: Arc<watch::Sender<bool>>,
    pub stats: Arc<Mutex<PollStats>>,
}

impl Coordinator {
    pub fn new(config: ConfigWrapper) -> Result<Self> {
        let mut targets = Vec::new();
        for inverter in config.enabled_inverters() {
            let endpoint = inverter.endpoint()?;
            let device = Device::new(endpoint, &inverter.link_options());
            targets.push(Target {
                inverter,
                device: Arc::new(device),
            });
        }

        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            queue: CommandQueue::new(config.queue_min_delay()),
            config,
            targets: Arc::new(targets),
            cache: ResponseCache::new(),
            shutdown: Arc::new(shutdown),
            stats: Arc::new(Mutex::new(PollStats::default())),
        })
    }

    fn stats(&self) -> MutexGuard<'_, PollStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.inverter.name() == name)
    }

    /// Starts the queue and polls until `stop` is called.
    pub async fn start(&self) -> Result<()> {
        self.queue.start();

        let mut shutdown = self.shutdown.subscribe();
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            "coordinator polling {} inverter(s) every {:?}",
            self.targets.len(),
            self.config.poll_interval()
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if tokio::time::timeout(CYCLE_TIMEOUT, self.poll_once()).await.is_err() {
                        warn!("polling cycle exceeded {:?}, abandoning it", CYCLE_TIMEOUT);
                        self.stats().cycles_timed_out += 1;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("coordinator loop exiting");
        Ok(())
    }

    pub fn stop(&self) {
        // stored even when start has not subscribed yet
        self.shutdown.send_replace(true);
        self.queue.stop();
        self.stats().print_summary();
    }

    /// One pass over every enabled inverter's command set. All commands are
    /// queued up front so they run back to back at the queue's spacing.
    pub async fn poll_once(&self) {
        let mut pending = Vec::new();
        for target in self.targets.iter() {
            for command in target.inverter.commands() {
                let label = format!("{} {}", target.inverter.name(), command);
                let device = target.device.clone();
                let cmd = command.clone();
                let handle = self
                    .queue
                    .enqueue(move || async move { Ok::<_, anyhow::Error>(device.execute(&cmd).await) }, &label);
                pending.push((target.inverter.name().to_string(), command, handle));
            }
        }

        for (name, command, handle) in pending {
            let decoded = match handle.await {
                Ok(decoded) => decoded,
                Err(e) => Decoded::error(e.to_string()),
            };

            {
                let mut stats = self.stats();
                stats.commands_sent += 1;
                if let Some(message) = decoded.error_message() {
                    stats.command_errors += 1;
                    stats.last_errors.insert(name.clone(), format!("{}: {}", command, message));
                }
            }

            self.cache.update(&name, &command, decoded);
        }

        self.stats().cycles += 1;

        for target in self.targets.iter() {
            if let Some(snapshot) = self.snapshot(target.inverter.name()) {
                match serde_json::to_string(&snapshot) {
                    Ok(json) => info!("{}: {}", target.inverter.name(), json),
                    Err(e) => warn!("{}: cannot serialize snapshot: {}", target.inverter.name(), e),
                }
            }
        }
    }

    pub fn cached(&self, name: &str, command: &str) -> Option<CachedResponse> {
        self.cache.get(name, command)
    }

    pub fn snapshot(&self, name: &str) -> Option<InverterSnapshot> {
        self.cache.snapshot(name)
    }

    /// Runs one command on demand, in line with the polling traffic. The
    /// result goes into the cache like a polled one.
    pub async fn execute(&self, name: &str, command: &str) -> Decoded {
        let device = match self.target(name) {
            Some(target) => target.device.clone(),
            None => return Decoded::error(format!("unknown inverter {}", name)),
        };

        let cmd = command.to_string();
        let label = format!("{} {}", name, command);
        let decoded = match self
            .queue
            .enqueue(move || async move { Ok::<_, anyhow::Error>(device.execute(&cmd).await) }, &label)
            .await
        {
            Ok(decoded) => decoded,
            Err(e) => Decoded::error(e.to_string()),
        };

        self.cache.update(name, command, decoded.clone());
        decoded
    }

    /// Applies a setting through the queue. A write that never ran because
    /// the queue was stopped answers `{status: FAIL}`.
    pub async fn write(&self, name: &str, setting: &Setting) -> Decoded {
        let device = match self.target(name) {
            Some(target) => target.device.clone(),
            None => return Decoded::error(format!("unknown inverter {}", name)),
        };

        let label = format!("{} set {}", name, setting.key());
        let owned = setting.clone();
        let result = match self
            .queue
            .enqueue(move || async move { Ok::<_, anyhow::Error>(device.write(&owned).await) }, &label)
            .await
        {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("{}: {}", label, e);
                Decoded::status("FAIL")
            }
        };

        let mut stats = self.stats();
        stats.writes_sent += 1;
        if result.is_error() || result.get_str("status") == Some("FAIL") {
            stats.write_errors += 1;
        }
        result
    }
}
