//! Encoder invocation: filter graphs, command lines and the process runner

pub mod cancel;
pub mod command;
pub mod filters;
pub mod process;

use std::fmt;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use command::{build_encoder_command, null_device, render_command_line, shell_quote};
pub use filters::{build_tempo_chain, build_video_filters, escape_filter_path};
pub use process::{parse_progress_line, EncoderRunner, FfmpegRunner, PassInvocation, ProgressUpdate};

/// One encoder invocation within a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePass {
    /// Analysis pass; writes the pass log and discards the output
    First,
    /// Final pass of a two-pass encode
    Second,
    /// Single constant-quality pass for quick previews
    Prototype,
}

impl EncodePass {
    /// Whether this pass writes the final output file
    pub fn writes_output(self) -> bool {
        !matches!(self, EncodePass::First)
    }
}

impl fmt::Display for EncodePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodePass::First => write!(f, "pass 1"),
            EncodePass::Second => write!(f, "pass 2"),
            EncodePass::Prototype => write!(f, "prototype pass"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_display() {
        assert_eq!(EncodePass::First.to_string(), "pass 1");
        assert_eq!(EncodePass::Second.to_string(), "pass 2");
        assert_eq!(EncodePass::Prototype.to_string(), "prototype pass");
    }

    #[test]
    fn test_only_first_pass_discards_output() {
        assert!(!EncodePass::First.writes_output());
        assert!(EncodePass::Second.writes_output());
        assert!(EncodePass::Prototype.writes_output());
    }
}
