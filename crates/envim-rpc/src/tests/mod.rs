//! Behavioural and integration-style tests for the RPC client.

mod support;
