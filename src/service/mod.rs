//! File services exposed to the API boundary.

mod acquisition;
mod lease;
mod orchestrator;

pub use acquisition::AcquisitionFileService;
pub use lease::LeaseService;
pub use orchestrator::FileUpdateOrchestrator;

use pims_types::{FileKind, PimsFile};

use crate::error::{PimsError, Result};

fn expect_kind(file: &PimsFile, kind: FileKind) -> Result<()> {
    if file.kind != kind {
        return Err(PimsError::Validation(format!(
            "expected a {} but received a {}",
            kind.display_name(),
            file.kind.display_name()
        )));
    }
    Ok(())
}
