pub mod ambient;
pub mod mirror;
