use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::SimbioConfig;
use crate::gradebook::Gradebook;
use crate::remote::{RemoteStore, RestRemote};
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: SimbioConfig,
    pub workspace: Option<PathBuf>,
    pub book: Option<Gradebook>,
}

impl AppState {
    pub fn new(config: SimbioConfig) -> Self {
        Self {
            config,
            workspace: None,
            book: None,
        }
    }

    /// Opens (or creates) the workspace store and wires the remote mirror.
    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = Store::open(&path)
            .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;
        let remote: Option<Box<dyn RemoteStore>> = match &self.config.remote {
            Some(cfg) => match RestRemote::new(cfg) {
                Ok(r) => Some(Box::new(r)),
                Err(e) => {
                    warn!(error = %e, "remote client unavailable; running local-only");
                    None
                }
            },
            None => None,
        };
        self.book = Some(
            Gradebook::new(store, remote).with_password_cost(self.config.password_cost()),
        );
        info!(workspace = %path.display(), "workspace opened");
        self.workspace = Some(path);
        Ok(())
    }

    pub fn close_workspace(&mut self) {
        self.book = None;
    }
}
