pub mod markers;
pub mod roles;
