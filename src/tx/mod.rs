//! Transaction submission with escalating gas pricing and receipt confirmation

mod gas;
mod sender;

pub use sender::{SnipeOutcome, SubmissionEngine};
