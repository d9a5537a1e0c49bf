pub mod job_description;
pub mod job_status;
pub mod job_tracker;
