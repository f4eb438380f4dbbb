pub mod error;
pub mod logger;
pub mod release;
pub mod validation;
