//! Integration tests for the persistent queue.
//!
//! - `durability.rs`  - reopen after clean close and after unclean drop
//! - `ordering.rs`    - FIFO order and id monotonicity
//! - `concurrency.rs` - concurrent writers and readers
//! - `observer.rs`    - observer notifications follow commits
