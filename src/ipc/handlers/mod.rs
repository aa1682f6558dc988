pub mod accounts;
pub mod assessments;
pub mod attendance;
pub mod core;
pub mod courses;
pub mod enrollment;
pub mod fees;
pub mod grades;
pub mod notices;
pub mod reports;
pub mod submissions;
