//! Storefront domain: plain data and rules, no I/O.
pub mod aggregates;
pub mod events;
pub mod value_objects;
