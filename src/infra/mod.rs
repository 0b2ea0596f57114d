//! Infrastructure adapters for site inventories.

pub mod memory;

pub use memory::{StaticSite, StaticSiteSource};
