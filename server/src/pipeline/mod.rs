pub mod orchestrator;
pub mod review;
