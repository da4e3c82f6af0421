//! Last-seen content per target; the ground truth for "has this changed".

mod fs;
mod memory;

pub use fs::FsVersionStore;
pub use memory::MemoryVersionStore;

use crate::error::StoreError;
use crate::model::VersionRecord;

/// Persistence for [`VersionRecord`]s and the content they describe.
///
/// `put` is the only mutation path. Access is sequential from a single orchestrator;
/// implementations need read-your-writes within the process and nothing more.
pub trait VersionStore: Send {
    /// Last persisted record for `target_id`, if any.
    fn get(&self, target_id: &str) -> Option<VersionRecord>;

    /// Stored content for `record`. `Ok(None)` when the blob has gone missing.
    fn read_content(&self, record: &VersionRecord) -> Result<Option<String>, StoreError>;

    /// Stores `content` as the current version of `target_id` and returns the updated record.
    fn put(&mut self, target_id: &str, source_url: &str, content: &str) -> Result<VersionRecord, StoreError>;

    /// All records, ordered by target id.
    fn records(&self) -> Vec<VersionRecord>;
}
