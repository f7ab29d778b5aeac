//! Integration test harness root.

mod mock_chain;
mod scheduler_sim;
