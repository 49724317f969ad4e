// Catalog browsing and admin writes
pub mod catalog;
