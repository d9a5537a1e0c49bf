pub mod computation_run;
pub mod configuration;
pub mod core;
pub mod dataset;
pub mod state;
pub mod table_export;
pub mod zone_set;
pub mod zone_source;
