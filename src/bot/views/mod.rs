/// Admin panel texts and keyboards
pub mod admin;
/// Learner texts, keyboards and callback tokens
pub mod course;

pub use admin::{AdminView, DefaultAdminView};
pub use course::{CourseView, DefaultCourseView};
