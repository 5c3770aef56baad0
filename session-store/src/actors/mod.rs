// session-store/src/actors/mod.rs

pub mod session_store;
