//! Local sectioned key/value config store.
//!
//! Mirrors a `configparser`-style INI file: sections are either a bare
//! probe name (defaults for every asset) or `<probe_name>/<asset_id>`
//! (overrides for one asset). The file is re-read whenever its mtime
//! changes, so a running probe picks up edits without a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::error::ProbeError;

type Section = HashMap<String, String>;

struct StoreState {
    last_mtime: Option<SystemTime>,
    sections: HashMap<String, Section>,
}

/// A probe's local, file-backed configuration store.
pub struct ConfigStore {
    path: PathBuf,
    probe_name: String,
    state: Mutex<StoreState>,
}

impl ConfigStore {
    /// Load the config file once, synchronously. Used at startup, where a
    /// missing or unparseable file is fatal — see [`crate::Probe::builder`].
    pub fn load_initial(path: impl Into<PathBuf>, probe_name: impl Into<String>) -> Result<Self, ProbeError> {
        let path = path.into();
        let probe_name = probe_name.into();
        let (mtime, sections) = read_sections(&path)?;
        Ok(Self {
            path,
            probe_name,
            state: Mutex::new(StoreState {
                last_mtime: Some(mtime),
                sections,
            }),
        })
    }

    /// Re-read the file if its mtime moved on. A file that goes missing or
    /// becomes unparseable after startup is tolerated: the previous snapshot
    /// is kept and a warning is logged by the caller.
    pub async fn reload(&self) -> Result<(), ProbeError> {
        let meta = match std::fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(_) => return Ok(()),
        };
        let mtime = meta
            .modified()
            .map_err(|e| ProbeError::StartupConfig(e.to_string()))?;

        {
            let state = self.state.lock().await;
            if state.last_mtime == Some(mtime) {
                return Ok(());
            }
        }

        let (mtime, sections) = read_sections(&self.path)?;
        let mut state = self.state.lock().await;
        state.last_mtime = Some(mtime);
        state.sections = sections;
        Ok(())
    }

    /// Config for one asset: `<probe_name>/<asset_id>` overrides layered
    /// over the bare `<probe_name>` defaults, falling back to empty if
    /// neither section exists.
    pub async fn asset_config(&self, asset_id: i64) -> Section {
        if let Err(e) = self.reload().await {
            tracing::warn!(error = %e, "local config file invalid, keeping previous snapshot");
        }
        let state = self.state.lock().await;
        let scoped = format!("{}/{asset_id}", self.probe_name);
        state
            .sections
            .get(&scoped)
            .cloned()
            .or_else(|| state.sections.get(&self.probe_name).cloned())
            .unwrap_or_default()
    }
}

fn read_sections(path: &Path) -> Result<(SystemTime, HashMap<String, Section>), ProbeError> {
    let meta = std::fs::metadata(path).map_err(|e| {
        ProbeError::StartupConfig(format!("cannot read {}: {e}", path.display()))
    })?;
    let mtime = meta
        .modified()
        .map_err(|e| ProbeError::StartupConfig(e.to_string()))?;

    let text = std::fs::read_to_string(path)
        .map_err(|e| ProbeError::StartupConfig(format!("cannot read {}: {e}", path.display())))?;
    let parsed = ini::Ini::load_from_str(&text)
        .map_err(|e| ProbeError::StartupConfig(format!("cannot parse {}: {e}", path.display())))?;

    let mut sections = HashMap::new();
    for (name, props) in parsed.iter() {
        let Some(name) = name else { continue };
        let section = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        sections.insert(name.to_string(), section);
    }
    Ok((mtime, sections))
}
