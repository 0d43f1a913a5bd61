//! Property test modules

mod presenter_tests;
mod stats_tests;
