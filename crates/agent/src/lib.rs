//! The agent loop for Cadence.
//!
//! An [`LlmAgent`] follows a **Respond → Act → Observe** cycle over one
//! session:
//!
//! 1. **Append** the user message to the session
//! 2. **Send** the session history and visible tools to the provider
//! 3. **If tool calls**: execute them in order, append results, loop back to 2
//! 4. **If text**: append it and return it
//!
//! A successful call to the designated completion tool also ends the turn.
//! The loop is bounded by `max_iterations` provider calls.

pub mod loop_runner;
pub mod testing;

pub use loop_runner::{COMPLETION_CONFIRMATION, LlmAgent};
