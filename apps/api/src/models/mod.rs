pub mod entity;
pub mod profile;
