pub mod config;
pub mod logging;
pub mod payroll;
pub mod pipeline;
pub mod storage;
pub mod upload;
pub mod warehouse;
