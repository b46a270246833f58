pub mod cell;
pub mod error;
pub mod mapping;
pub mod record;
