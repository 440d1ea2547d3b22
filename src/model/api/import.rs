use serde::{Deserialize, Serialize};

/// Summary of a bulk import. Every data row lands in exactly one bucket.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Rows that created something new.
    pub created: usize,
    /// Rows that matched existing data. For users this counts updates.
    pub skipped: usize,
    /// Rows that could not be parsed or were rejected.
    pub failed: usize,
}

impl ImportReport {
    pub fn rows(&self) -> usize {
        self.created + self.skipped + self.failed
    }
}

impl std::ops::AddAssign for ImportReport {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}
