use std::path::Path;

use crate::api::config_dto::SessionConfigDto;
use crate::domain::session::SessionContext;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Initialises logging and builds the session described by a JSON configuration file.
pub fn init_session(config_path: impl AsRef<Path>) -> Result<SessionContext> {
    logger::init();

    let config_path = config_path.as_ref();
    log::info!("Loading session configuration from '{}'.", config_path.display());

    let dto: SessionConfigDto = parse_json_file(config_path)?;
    log::info!("Configuration parsed successfully, project namespace '{}'.", dto.project_namespace);

    SessionContext::from_config(&dto)
}
