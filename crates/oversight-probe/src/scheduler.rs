//! Per-(asset, check) task lifecycle and the reconciliation algorithm that
//! keeps the running task set in step with AgentCore's assignments.
//!
//! One task per [`Path`] runs a `sleep, run check, ship result` loop on the
//! cadence grid fixed by `_interval` at the task's creation. A task is
//! cancelled cooperatively — it notices via its [`CancellationToken`] at its
//! next suspension point rather than being aborted mid-poll, which is what
//! lets it tell apart "the scheduler retired me" from "I was cancelled for
//! some other reason" (see the identity check in [`run_check_loop`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use oversight_protocol::message::{frame_type, DumpPayload};
use oversight_protocol::{interval_from_config, AssetHandle, CheckAssignment, ConfigMap, ErrorDescriptor, Names, Path};
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::check::Catalog;
use crate::config::ConfigStore;
use crate::link::Link;

/// A live check task: its cooperative-cancellation handle, its identity
/// marker (for the internal/external cancellation distinction), and the
/// `JoinHandle` whose `is_finished()` tells reconciliation whether the task
/// already self-retired via `ignore_check`.
struct TrackedTask {
    identity: Arc<()>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Owns the check catalog and the currently running tasks, and reconciles
/// them against each assignment snapshot AgentCore sends.
pub struct Scheduler {
    catalog: Arc<Catalog>,
    config_store: Arc<ConfigStore>,
    link: Link,
    /// The last assignment accepted for each path — read fresh by the
    /// running task on every tick, so a config change takes effect without
    /// restarting the task.
    checks_config: Mutex<HashMap<Path, (Names, ConfigMap)>>,
    tasks: Mutex<HashMap<Path, TrackedTask>>,
}

impl Scheduler {
    pub fn new(catalog: Catalog, config_store: Arc<ConfigStore>, link: Link) -> Arc<Self> {
        Arc::new(Self {
            catalog: Arc::new(catalog),
            config_store,
            link,
            checks_config: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Apply one assignment snapshot. Entries for checks not in the
    /// catalog, or without a positive `_interval`, are dropped before
    /// comparison — they were never schedulable.
    pub async fn reconcile(self: Arc<Self>, assignments: Vec<CheckAssignment>) {
        let desired: HashMap<Path, (Names, ConfigMap)> = assignments
            .into_iter()
            .filter(|a| self.catalog.contains_key(a.names.check_name()))
            .filter(|a| a.interval_secs().is_some())
            .map(|a| (a.path, (a.names, a.config)))
            .collect();

        let mut checks_config = self.checks_config.lock().await;
        let mut tasks = self.tasks.lock().await;

        let tracked_paths: Vec<Path> = tasks.keys().copied().collect();
        for path in tracked_paths {
            if !desired.contains_key(&path) {
                if let Some(task) = tasks.remove(&path) {
                    task.token.cancel();
                }
            } else if checks_config.get(&path) != desired.get(&path) {
                let finished = tasks.get(&path).map(|t| t.join.is_finished()).unwrap_or(true);
                if finished {
                    tasks.remove(&path);
                }
            }
        }

        *checks_config = desired.clone();

        for (path, _) in desired {
            if tasks.contains_key(&path) {
                continue;
            }
            let identity = Arc::new(());
            let token = CancellationToken::new();
            let join = Arc::clone(&self).spawn_check_loop(path, identity.clone(), token.clone());
            tasks.insert(
                path,
                TrackedTask {
                    identity,
                    token,
                    join,
                },
            );
        }
    }

    fn spawn_check_loop(self: Arc<Self>, path: Path, identity: Arc<()>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_check_loop(path, identity, token).await;
        })
    }

    async fn run_check_loop(&self, path: Path, identity: Arc<()>, token: CancellationToken) {
        let Some((names, config)) = self.checks_config.lock().await.get(&path).cloned() else {
            return;
        };
        let Some(check) = self.catalog.get(names.check_name()).cloned() else {
            return;
        };
        let Some(initial_interval) = interval_from_config(&config) else {
            return;
        };
        let asset = AssetHandle {
            id: path.asset_id(),
            asset_name: names.asset_name().to_string(),
            check_name: names.check_name().to_string(),
        };

        let mut ts_next = jittered_start(initial_interval);

        loop {
            let sleep_for = (ts_next as f64 - now_secs()).max(0.0);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(sleep_for)) => {}
                _ = token.cancelled() => {
                    tracing::debug!(%asset, "check task cancelled while sleeping");
                    return;
                }
            }

            let Some((_, config)) = self.checks_config.lock().await.get(&path).cloned() else {
                return;
            };
            let Some(interval) = interval_from_config(&config) else {
                return;
            };

            let asset_config = self.config_store.asset_config(path.asset_id()).await;
            let timeout = Duration::from_secs_f64(0.8 * interval as f64);
            let check_future = (*check)(asset.clone(), asset_config, config);

            let outcome = tokio::select! {
                result = tokio::time::timeout(timeout, check_future) => {
                    match result {
                        Ok(outcome) => outcome,
                        Err(_) => crate::check::CheckOutcome::error("check timed out"),
                    }
                }
                _ = token.cancelled() => {
                    let still_mine = self.tasks.lock().await
                        .get(&path)
                        .map(|t| Arc::ptr_eq(&t.identity, &identity))
                        .unwrap_or(false);
                    if still_mine {
                        crate::check::CheckOutcome::error("cancelled")
                    } else {
                        tracing::debug!(%asset, "check task retired by scheduler mid-run");
                        return;
                    }
                }
            };

            let stop = matches!(outcome, crate::check::CheckOutcome::IgnoreCheck);
            self.handle_outcome(path, &asset, outcome, ts_next).await;
            if stop {
                return;
            }

            ts_next += interval as i64;
        }
    }

    async fn handle_outcome(&self, path: Path, asset: &AssetHandle, outcome: crate::check::CheckOutcome, ts_next: i64) {
        use crate::check::CheckOutcome;
        match outcome {
            CheckOutcome::IgnoreResult => {
                tracing::debug!(%asset, "ignoring this tick's result");
            }
            CheckOutcome::IgnoreCheck => {
                tracing::info!(%asset, "check asked to stop being scheduled");
            }
            CheckOutcome::Result(value) => {
                let pair = if value.is_map() {
                    (Some(value), None)
                } else {
                    (
                        None,
                        Some(ErrorDescriptor::new(
                            format!("expecting map result, got {}", value_kind(&value)),
                            oversight_protocol::Severity::default(),
                        )),
                    )
                };
                self.emit_dump(path, pair, ts_next).await;
            }
            CheckOutcome::Incomplete { partial, message, severity } => {
                self.emit_dump(path, (Some(partial), Some(ErrorDescriptor::new(message, severity))), ts_next)
                    .await;
            }
            CheckOutcome::Error { message, severity } => {
                tracing::warn!(%asset, error = %message, "check reported an error");
                self.emit_dump(path, (None, Some(ErrorDescriptor::new(message, severity))), ts_next)
                    .await;
            }
        }
    }

    async fn emit_dump(&self, path: Path, result: (Option<rmpv::Value>, Option<ErrorDescriptor>), ts_next: i64) {
        let payload = DumpPayload {
            path,
            result,
            ts_next,
        };
        self.link
            .send_frame(oversight_protocol::Frame::new(
                frame_type::FAF_DUMP,
                0,
                path.asset_id() as u32,
                Bytes::from(payload.encode()),
            ))
            .await;
    }
}

fn jittered_start(interval: u64) -> i64 {
    let fraction: f64 = rand::rng().random::<f64>();
    (now_secs() + fraction * interval as f64).floor() as i64 + 1
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn value_kind(value: &rmpv::Value) -> &'static str {
    match value {
        rmpv::Value::Nil => "nil",
        rmpv::Value::Boolean(_) => "boolean",
        rmpv::Value::Integer(_) => "integer",
        rmpv::Value::F32(_) | rmpv::Value::F64(_) => "float",
        rmpv::Value::String(_) => "string",
        rmpv::Value::Binary(_) => "binary",
        rmpv::Value::Array(_) => "array",
        rmpv::Value::Map(_) => "map",
        rmpv::Value::Ext(_, _) => "ext",
    }
}
