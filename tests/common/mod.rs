#![allow(dead_code)]

pub mod fixtures;
pub mod stub_server;
pub mod test_home;

pub use test_home::TestHomeGuard;
