pub mod context;
pub mod money;
pub mod ports;
pub mod record;
pub mod rule;
