pub mod errors;
pub mod portfolio;
pub mod ports;
pub mod quote;
pub mod symbols;
