pub mod schedule;
pub mod streaks;
