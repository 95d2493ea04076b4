//! Effects produced by state transitions

use crate::outline::Outline;
use crate::processor::{ContractViolation, ProcessorError};
use crate::state_machine::state::QaPair;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Push the new state to presentation adapters
    PublishSnapshot,

    /// Start the (single) processor call for the submitted turn
    InvokeProcessor {
        request_id: u64,
        /// Completed turns plus the one just submitted
        transcript: Vec<QaPair>,
    },

    /// Log and surface a failed processor call
    ReportFailure { error: ProcessorError },

    /// Log a malformed processor reply
    ReportAnomaly { violation: ContractViolation },

    /// Write the outline into the host document (fires once, on completion)
    ApplyArtifact {
        field_path: String,
        outline: Outline,
        transcript: Vec<QaPair>,
    },
}

impl Effect {
    pub fn invoke_processor(request_id: u64, transcript: Vec<QaPair>) -> Self {
        Effect::InvokeProcessor {
            request_id,
            transcript,
        }
    }

    pub fn report_failure(error: ProcessorError) -> Self {
        Effect::ReportFailure { error }
    }
}
