//! Test fixtures for mockop.
//!
//! Shared helpers for building response directories, state chains and
//! scripted stand-ins for the real tool in integration tests.

pub mod helpers;
