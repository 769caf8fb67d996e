pub mod attendance;
pub mod core;
pub mod enrollments;
pub mod events;
pub mod faculty;
pub mod students;
