//! End-to-end scenario tests for the shelf chart repository live in
//! `tests/`. This crate intentionally exports nothing.
