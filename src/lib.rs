//! Workspace root package. See the member crates under `crates/` for implementation.
