pub mod call;
pub mod traces;
pub mod transactions;
