//! Infrastructure adapters for storage and conversation collaborators.

pub mod memory;
pub mod scripted;
pub mod sqlite;
