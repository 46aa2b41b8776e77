//! Exit codes for sleuthctl

use sleuth_common::ResearchError;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when the model could not produce the final answer
pub const EXIT_MODEL_UNAVAILABLE: i32 = 70;

/// Map a top-level error to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ResearchError>() {
        Some(ResearchError::ModelUnavailable(_)) => EXIT_MODEL_UNAVAILABLE,
        _ => EXIT_GENERAL_ERROR,
    }
}
