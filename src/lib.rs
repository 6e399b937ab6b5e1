//! SERP layout intelligence: turns raw search-results items into a canonical
//! layout record, scores its stability against history and raises intent alerts.

pub mod analysis;
pub mod db;
pub mod pipeline;
pub mod serp;
pub mod store;
