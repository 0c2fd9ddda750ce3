pub mod attendance;
pub mod auth;
pub mod backup;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod exams;
pub mod gallery;
pub mod notices;
pub mod payments;
pub mod public;
pub mod results;
pub mod student_portal;
pub mod students;
pub mod teacher_portal;
pub mod teachers;
