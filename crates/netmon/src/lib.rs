//! `netmon` binary support: CLI definitions, tracing setup and the
//! collaborator self-test. The monitor itself lives in `remediation`.

pub mod cli;
pub mod telemetry;
