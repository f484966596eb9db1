//! Domain model: enums and record structs persisted by the store.

pub mod issue;
pub mod user;
