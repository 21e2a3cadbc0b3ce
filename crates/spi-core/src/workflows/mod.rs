//! Per-workflow status vocabularies, line parsers and report reducers.

pub mod fork;
pub mod status;
pub mod test_run;
pub mod triage;
