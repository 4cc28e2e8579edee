//! Compliance summary reports written to the output folder.

use crate::compliance::ComplianceSnapshot;
use crate::Result;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Summary of a monitoring session
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceReport {
    /// Most faces seen in a single frame
    pub people: usize,
    /// Biased compliance ratio
    pub compliance: f64,
    /// When the report was taken
    pub created: DateTime<Local>,
}

impl ComplianceReport {
    /// Capture the current statistics
    #[must_use]
    pub fn from_snapshot(snapshot: &ComplianceSnapshot) -> Self {
        Self {
            people: snapshot.max_people,
            compliance: snapshot.ratio,
            created: Local::now(),
        }
    }

    /// Report body: a header line then `People,<n>` and `Compliance,<ratio>`
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "This is a mask compliance report for: {}",
            self.created.format("%a %b %e %H:%M:%S %Y")
        );
        let _ = writeln!(out, "People,{}", self.people);
        let _ = writeln!(out, "Compliance,{}", self.compliance);
        out
    }

    /// File name the report is exported under
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("Compliance_Report_{}.csv", self.created.format("%Y-%m-%d_%H-%M-%S"))
    }

    /// Write the report into `folder`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the file cannot be written
    pub fn export<P: AsRef<Path>>(&self, folder: P) -> Result<PathBuf> {
        std::fs::create_dir_all(folder.as_ref())?;
        let path = folder.as_ref().join(self.file_name());
        std::fs::write(&path, self.render())?;
        log::info!("Compliance report saved at {}", path.display());
        Ok(path)
    }
}
