pub mod categories;
pub mod sync;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use chrono::Utc;
use crmsync_core::{
    run_id, ApplyPolicy, ChangeReport, CloseClient, FsSnapshotStore, HttpResourceClient,
    MemorySnapshotStore, SnapshotStore, SyncConfig,
};

use crate::cli::Cli;
use crate::transport::UreqTransport;

pub type Environment = HttpResourceClient<UreqTransport>;

/// Where snapshots and the report of this run go.
pub enum Archive {
    Disk(FsSnapshotStore),
    Memory(MemorySnapshotStore),
}

impl Archive {
    pub fn store(&self) -> &dyn SnapshotStore {
        match self {
            Archive::Disk(store) => store,
            Archive::Memory(store) => store,
        }
    }

    /// Write `report.json` into the run directory. Returns the path written,
    /// if any.
    pub fn save_report(&self, report: &ChangeReport) -> Result<Option<PathBuf>> {
        match self {
            Archive::Disk(store) => {
                let path = store
                    .save_json("report.json", report)
                    .context("could not archive the change report")?;
                Ok(Some(path))
            }
            Archive::Memory(_) => Ok(None),
        }
    }
}

/// Everything a sync or plan needs, resolved from the command line.
pub struct Context {
    pub config: SyncConfig,
    pub source: Environment,
    pub target: Environment,
    pub archive: Archive,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let source_key = cli.source_key.as_deref().ok_or_else(|| {
            anyhow!("no source API key; set CLOSEIO_API_KEY_PROD or pass --source-key")
        })?;
        let target_key = cli.target_key.as_deref().ok_or_else(|| {
            anyhow!("no target API key; set CLOSEIO_API_KEY_DEV or pass --target-key")
        })?;
        if cli.source_url == cli.target_url && source_key == target_key {
            anyhow::bail!("source and target are the same environment");
        }

        let delay = Duration::from_millis(cli.write_delay_ms);
        let source = HttpResourceClient::new(
            CloseClient::new(&cli.source_url, source_key),
            UreqTransport::new(),
        );
        let target = HttpResourceClient::new(
            CloseClient::new(&cli.target_url, target_key),
            UreqTransport::new(),
        )
        .with_write_delay(delay);

        let config = SyncConfig::new(&cli.source_label, &cli.target_label)
            .with_categories(cli.only.clone())
            .with_policy(ApplyPolicy {
                allow_deletes: !cli.no_delete,
            });

        let archive = if cli.no_archive {
            Archive::Memory(MemorySnapshotStore::new())
        } else {
            let store = FsSnapshotStore::new(&cli.data_dir, &run_id(Utc::now()));
            tracing::info!(dir = %store.run_dir().display(), "archiving run");
            Archive::Disk(store)
        };

        Ok(Self {
            config,
            source,
            target,
            archive,
        })
    }
}
