pub mod capture_session;
pub mod catalog;
pub mod coordinator;
pub mod shared;
