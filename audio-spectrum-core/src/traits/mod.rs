pub mod callback_host;
pub mod capture_delegate;
pub mod loopback_host;
