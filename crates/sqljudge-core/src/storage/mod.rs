pub mod recorder;
pub mod schema;
pub mod store;

pub use recorder::{RecordOutcome, SubmissionRecorder};
pub use store::Store;
