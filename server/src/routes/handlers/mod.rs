pub mod process;
pub mod review;
