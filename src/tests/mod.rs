//! Unit tests for the task manager core.

mod codec_tests;
mod manager_tests;
mod support;
