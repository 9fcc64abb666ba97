pub mod errors;
pub mod evaluation;
pub mod events;
pub mod market_data;
pub mod outcomes;
pub mod ports;
pub mod signals;
pub mod workflow;
