use std::fmt;

use crate::domain::utils::id::DatasetUuid;

/// Renders a shard identifier the way it appears in object names and job descriptions.
pub fn format_shard_id(fid: i64) -> String {
    format!("{:04}", fid)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Upload,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTarget {
    Config,
    Shard(i64),
}

/// The free-text description attached to every export job.
///
/// The remote platform has no job grouping, so this string is the only link
/// between a job and its dataset. External tooling parses it, the shapes are fixed:
/// `upload <uuid> config`, `upload <uuid> fid 0007`, `compute <uuid> config`, `compute <uuid> fid 0007`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    pub phase: JobPhase,
    pub uuid: DatasetUuid,
    pub target: JobTarget,
}

impl JobDescription {
    pub fn new(phase: JobPhase, uuid: DatasetUuid, target: JobTarget) -> Self {
        JobDescription { phase, uuid, target }
    }

    pub fn parse(description: &str) -> Option<JobDescription> {
        let parts: Vec<&str> = description.split_whitespace().collect();

        let phase = match parts.first()? {
            &"upload" => JobPhase::Upload,
            &"compute" => JobPhase::Compute,
            _ => return None,
        };
        let uuid = DatasetUuid::new(*parts.get(1)?);

        let target = match &parts[2..] {
            ["config"] => JobTarget::Config,
            ["fid", fid] => JobTarget::Shard(fid.parse().ok()?),
            _ => return None,
        };

        Some(JobDescription { phase, uuid, target })
    }
}

impl fmt::Display for JobDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            JobPhase::Upload => "upload",
            JobPhase::Compute => "compute",
        };

        match self.target {
            JobTarget::Config => write!(f, "{} {} config", phase, self.uuid),
            JobTarget::Shard(fid) => write!(f, "{} {} fid {}", phase, self.uuid, format_shard_id(fid)),
        }
    }
}
