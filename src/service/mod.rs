//! Pure domain logic: no I/O, no logging, clock passed in by the caller.

pub mod shift_validation;
pub mod statistics;
pub mod time_range;
