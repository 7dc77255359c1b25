pub mod block;
pub mod block_fetcher;
pub mod hash;
pub mod target;
