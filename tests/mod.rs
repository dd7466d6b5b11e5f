mod common;
mod preference_tests;
