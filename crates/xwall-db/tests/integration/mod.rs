pub mod common;
mod mention_tests;
