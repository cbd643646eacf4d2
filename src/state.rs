//! State-transition engine contract and the concurrent access adapter that
//! serializes mutations while leaving queries lock-free.

pub mod client;
pub mod engine;
