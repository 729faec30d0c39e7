//! Remote code-execution pipeline: harness generation, judge dispatch and
//! polling, verdict evaluation, and the orchestrator tying them together.

pub mod error;
pub mod evaluator;
pub mod harness;
pub mod judge;
pub mod pipeline;

pub use error::SubmissionError;
pub use harness::HarnessRegistry;
pub use judge::{Judge, Judge0Client, JudgeJob, JudgeStatus, PollPolicy};
pub use pipeline::SubmissionPipeline;
