pub mod fire_times;
pub mod plan;
pub mod validate;
