//! HTTP API for crewcap-recon

pub mod assignments;
pub mod capacity;
pub mod health;
pub mod import;
pub mod transcripts;

pub use assignments::assignment_routes;
pub use capacity::capacity_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use transcripts::transcript_routes;
