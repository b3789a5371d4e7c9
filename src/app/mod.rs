pub mod comms;
pub mod report;
pub mod segments;
pub mod telemetry;
pub mod tuning;

#[cfg(test)]
pub mod mock;
