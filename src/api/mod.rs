pub mod config_dto;
pub mod parameters_dto;
pub mod run_record_dto;
