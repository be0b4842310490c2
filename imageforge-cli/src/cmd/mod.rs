pub mod build;
pub mod explain;
pub mod validate;
