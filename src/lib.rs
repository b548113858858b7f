pub mod app;
pub mod config;
pub mod report;
pub mod shared;
pub mod store;
pub mod task_service;
pub mod workflow;
