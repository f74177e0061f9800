pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use error::PaymentError;
pub use startup::{build_router, AppState, Application};
