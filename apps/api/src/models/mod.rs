pub mod applicant;
pub mod comparison;
pub mod project;
