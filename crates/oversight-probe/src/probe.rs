//! The public entry point: wires a check catalog together with the
//! scheduler, the AgentCore link, and the local config store, and runs
//! the whole thing until told to stop.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::check::{BoxedCheckFn, Catalog};
use crate::config::ConfigStore;
use crate::dispatcher::Dispatcher;
use crate::link::Link;
use crate::scheduler::Scheduler;
use crate::supervisor::Supervisor;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8750;
const DEFAULT_CONFIG_PATH: &str = "/data/config/oversight.conf";

/// Builds a [`Probe`] from a check catalog plus connection/config
/// overrides. Host programs typically call [`Probe::builder`], register
/// their checks with [`ProbeBuilder::check`], and finish with
/// [`ProbeBuilder::build`].
pub struct ProbeBuilder {
    name: String,
    version: String,
    host: String,
    port: u16,
    config_path: PathBuf,
    catalog: Catalog,
}

impl ProbeBuilder {
    fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let host = std::env::var("AGENTCORE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("AGENTCORE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let config_path = std::env::var("OVERSIGHT_CONF")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self {
            name: name.into(),
            version: version.into(),
            host,
            port,
            config_path,
            catalog: Catalog::new(),
        }
    }

    pub fn check(mut self, name: impl Into<String>, f: BoxedCheckFn) -> Self {
        self.catalog.insert(name.into(), f);
        self
    }

    pub fn coordinator(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Finish building. The local config file is read synchronously here;
    /// a missing or unparseable file at startup is fatal and exits the
    /// process with status 0 after logging, matching the rest of the
    /// probe fleet's startup contract.
    pub fn build(self) -> Probe {
        let config_store = match ConfigStore::load_initial(&self.config_path, &self.name) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(error = %e, path = %self.config_path.display(), "local config unreadable at startup, exiting");
                std::process::exit(0);
            }
        };

        let link = Link::new();
        let scheduler = Scheduler::new(self.catalog, config_store, link.clone());
        let dispatcher = Arc::new(Dispatcher::new(link.clone(), scheduler));
        let supervisor = Supervisor::new(link, dispatcher, self.name, self.version, self.host, self.port);

        Probe {
            supervisor,
            shutdown: CancellationToken::new(),
        }
    }
}

/// A running probe. Call [`Probe::run`] to drive the connection
/// supervisor and check scheduler until [`Probe::shutdown_token`] is
/// cancelled.
pub struct Probe {
    supervisor: Arc<Supervisor>,
    shutdown: CancellationToken,
}

impl Probe {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ProbeBuilder {
        ProbeBuilder::new(name, version)
    }

    /// A handle the host program can cancel to stop [`Probe::run`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) {
        self.supervisor.run(self.shutdown.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_come_from_env_when_unset() {
        std::env::remove_var("AGENTCORE_HOST");
        std::env::remove_var("AGENTCORE_PORT");
        let builder = ProbeBuilder::new("probe", "0.1.0");
        assert_eq!(builder.host, DEFAULT_HOST);
        assert_eq!(builder.port, DEFAULT_PORT);
    }

    #[test]
    fn coordinator_override_wins_over_env() {
        let builder = ProbeBuilder::new("probe", "0.1.0").coordinator("10.0.0.5", 9000);
        assert_eq!(builder.host, "10.0.0.5");
        assert_eq!(builder.port, 9000);
    }
}
