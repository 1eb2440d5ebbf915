pub mod factory;
pub mod math;
pub mod pool;
