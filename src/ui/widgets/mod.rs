// src/ui/widgets/mod.rs

pub mod footer;
pub mod input;
pub mod jobs;
pub mod summary;
