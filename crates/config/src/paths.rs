//! On-disk layout under the data directory.
//!
//! ```text
//! <data_dir>/
//!   store/messages.db
//!   data/router_state.json
//!   data/sessions.json
//!   data/registered_groups.json
//!   data/metrics.prom
//!   groups/<folder>/CLAUDE.md
//! ```

use std::path::{Path, PathBuf};

use crate::schema::PincerConfig;

/// Resolved paths for every persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from config: explicit `paths.data_dir`, else the platform data
    /// directory (`~/.local/share/pincer` on Linux), else `./pincer-data`.
    pub fn resolve(config: &PincerConfig) -> Self {
        if let Some(dir) = &config.paths.data_dir {
            return Self::new(dir.clone());
        }
        directories::ProjectDirs::from("", "", "pincer")
            .map(|d| Self::new(d.data_dir()))
            .unwrap_or_else(|| Self::new("pincer-data"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn message_db(&self) -> PathBuf {
        self.root.join("store").join("messages.db")
    }

    pub fn watermark_file(&self) -> PathBuf {
        self.state_dir().join("router_state.json")
    }

    pub fn sessions_file(&self) -> PathBuf {
        self.state_dir().join("sessions.json")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.state_dir().join("registered_groups.json")
    }

    /// Prometheus text snapshot written by the running gateway.
    pub fn metrics_file(&self) -> PathBuf {
        self.state_dir().join("metrics.prom")
    }

    pub fn groups_dir(&self) -> PathBuf {
        self.root.join("groups")
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_wins() {
        let mut cfg = PincerConfig::default();
        cfg.paths.data_dir = Some(PathBuf::from("/srv/pincer"));
        let layout = DataLayout::resolve(&cfg);
        assert_eq!(layout.root(), Path::new("/srv/pincer"));
        assert_eq!(
            layout.message_db(),
            PathBuf::from("/srv/pincer/store/messages.db")
        );
        assert_eq!(
            layout.watermark_file(),
            PathBuf::from("/srv/pincer/data/router_state.json")
        );
        assert_eq!(
            layout.metrics_file(),
            PathBuf::from("/srv/pincer/data/metrics.prom")
        );
        assert_eq!(layout.groups_dir(), PathBuf::from("/srv/pincer/groups"));
    }
}
