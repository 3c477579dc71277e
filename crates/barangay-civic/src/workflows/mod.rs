pub mod documents;
pub mod triage;
