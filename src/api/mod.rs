pub mod project;
pub mod shift;
pub mod statistics;
pub mod task;
pub mod time_entry;
pub mod user;
