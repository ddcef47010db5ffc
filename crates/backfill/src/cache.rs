use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use anyhow::Context;
use dropfill_chain_client::LogRecord;


/// On-disk store of scanned mint-event logs, one JSON file per
/// (network, contract).
///
/// The key deliberately omits the event signature and the scan's
/// from_block; if either changes across runs the stale file must be
/// deleted by the operator, or its records will be reused as-is.
///
/// A file is written only after a scan ran to completion, so a present
/// file always holds the full record sequence for its contract.
pub struct LogCache {
    dir: PathBuf,
}

impl LogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_path(&self, network: &str, contract: Address) -> PathBuf {
        self.dir.join(format!("{}_{:#x}.json", network, contract))
    }

    /// `None` means no cache exists for the key yet, which is the normal
    /// first-run path.
    pub fn load(
        &self,
        network: &str,
        contract: Address,
    ) -> anyhow::Result<Option<Vec<LogRecord>>> {
        let path = self.file_path(network, contract);
        if !path.exists() {
            return Ok(None);
        }
        let records = read_records(&path)
            .with_context(|| format!("failed to read log cache {}", path.display()))?;
        Ok(Some(records))
    }

    /// Overwrites any previous cache for the key with the full record
    /// sequence.
    pub fn save(
        &self,
        network: &str,
        contract: Address,
        records: &[LogRecord],
    ) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path(network, contract);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create log cache {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), records)?;
        Ok(())
    }
}


fn read_records(path: &Path) -> anyhow::Result<Vec<LogRecord>> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
