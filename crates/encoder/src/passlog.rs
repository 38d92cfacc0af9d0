//! Two-pass statistics files
//!
//! The first pass writes `<base>-0.log` (and `<base>-0.log.temp` while it is
//! running); the second pass reads it. The base is derived from the output
//! path, so concurrent encodes of different outputs never share a log.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CleanupWarning;

/// Pass-log location for one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassLog {
    base: PathBuf,
}

impl PassLog {
    /// `<output dir>/<output stem>_passlog`; a bare file name keeps the log in the working directory
    pub fn for_output(output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let name = format!("{}_passlog", stem);
        let base = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
            _ => PathBuf::from(name),
        };
        Self { base }
    }

    /// Value handed to `-passlogfile`
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Files the encoder may create for this base
    pub fn files(&self) -> [PathBuf; 2] {
        let mut log = self.base.as_os_str().to_owned();
        log.push("-0.log");
        let mut temp = log.clone();
        temp.push(".temp");
        [PathBuf::from(log), PathBuf::from(temp)]
    }

    /// Remove whichever log files exist
    ///
    /// Failures are returned as warnings; a missing file is not a failure.
    pub fn cleanup(&self) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();

        for path in self.files() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed pass log {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    let warning = CleanupWarning { path, error };
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        warnings
    }
}
