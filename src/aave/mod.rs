pub mod aggregator;
pub mod fetcher;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod rates;
pub mod types;
