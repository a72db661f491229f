//! Algorithms implemented on and returning [`GeoTable`](crate::table::GeoTable)s.

pub mod dedup;
pub mod filter;
pub mod proj;
pub mod utm;
