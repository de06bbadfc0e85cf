//! StorageClass parameter parsing.

use std::collections::HashMap;

use crate::error::{ProvisionError, Result};

pub const POOL_PARAM: &str = "targetd-provisioner/pool";
pub const TARGET_PARAM: &str = "targetd-provisioner/target";
/// Comma-separated portal list
pub const PORTALS_PARAM: &str = "targetd-provisioner/portals";
/// Comma-separated initiator IQN list
pub const INITIATORS_PARAM: &str = "targetd-provisioner/initiators";
pub const FS_TYPE_PARAM: &str = "fsType";

pub const DEFAULT_FS_TYPE: &str = "ext4";

/// Parameters of a StorageClass handled by this provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassParameters {
    pub pool: String,
    /// IQN of the target
    pub target: String,
    pub portals: Vec<String>,
    pub initiators: Vec<String>,
    pub fs_type: String,
}

impl StorageClassParameters {
    /// Parse the StorageClass parameters.
    ///
    /// Required keys are checked in a fixed order (pool, target, portals,
    /// initiators) and the first one that is missing or set to an empty
    /// string is reported. List values are split on ',' as-is: empty
    /// elements such as the one produced by a trailing comma are kept.
    pub fn parse(parameters: &HashMap<String, String>) -> Result<Self> {
        let pool = required(parameters, POOL_PARAM)?;
        let target = required(parameters, TARGET_PARAM)?;
        let portals = split_list(required(parameters, PORTALS_PARAM)?);
        let initiators = split_list(required(parameters, INITIATORS_PARAM)?);

        let fs_type = parameters
            .get(FS_TYPE_PARAM)
            .cloned()
            .unwrap_or_else(|| DEFAULT_FS_TYPE.to_string());

        Ok(Self {
            pool: pool.to_string(),
            target: target.to_string(),
            portals,
            initiators,
            fs_type,
        })
    }
}

fn required<'a>(parameters: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str> {
    match parameters.get(key).map(String::as_str) {
        None => Err(ProvisionError::MissingParameter(key)),
        Some("") => Err(ProvisionError::EmptyParameter(key)),
        Some(value) => Ok(value),
    }
}

/// Split a comma-separated value, keeping empty elements.
pub fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}
