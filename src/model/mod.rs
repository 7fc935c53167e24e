pub mod project;
pub mod role;
pub mod shift;
pub mod task;
pub mod time_entry;
pub mod user;
