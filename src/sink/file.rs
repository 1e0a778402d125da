use super::{Sink, SinkError};
use crate::aggregation::AggregateRecord;
use log::debug;
use std::path::PathBuf;

/// Keeps exactly one line, the latest aggregate, in a plain text file
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileSink { path: path.into() }
    }
}

impl Sink for FileSink {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn write_aggregate(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        /* overwrite, readers only ever want the latest values */
        tokio::fs::write(&self.path, record.to_line()).await?;
        debug!("Wrote aggregate to {}", self.path.display());
        Ok(())
    }
}
