pub mod ai;
pub mod email;
pub mod report;
