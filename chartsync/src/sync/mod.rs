pub mod backoff;
pub mod engine;
pub mod scanner;
pub mod state;
pub mod transfer;
