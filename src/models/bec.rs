use serde::{Deserialize, Serialize};

/// Broad region a BEC zone belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Coastal,
    Interior,
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Coastal => write!(f, "Coastal"),
            Region::Interior => write!(f, "Interior"),
        }
    }
}

/// A biogeoclimatic zone and the zones whose equations it borrows for
/// growth, decay and volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BecDefinition {
    pub alias: String,
    #[serde(default)]
    pub name: String,
    pub region: Region,
    /// Zone used for the utilization-class BA and DQ equations; defaults to `alias`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_alias: Option<String>,
    /// Zone used for decay, breakage and the primary yield equations; defaults to `alias`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_alias: Option<String>,
    /// Zone used for volume groups; defaults to `alias`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_alias: Option<String>,
}

impl BecDefinition {
    pub fn new(alias: impl Into<String>, region: Region) -> Self {
        let alias = alias.into();
        Self {
            name: alias.clone(),
            alias,
            region,
            growth_alias: None,
            decay_alias: None,
            volume_alias: None,
        }
    }

    pub fn growth_alias(&self) -> &str {
        self.growth_alias.as_deref().unwrap_or(&self.alias)
    }

    pub fn decay_alias(&self) -> &str {
        self.decay_alias.as_deref().unwrap_or(&self.alias)
    }

    pub fn volume_alias(&self) -> &str {
        self.volume_alias.as_deref().unwrap_or(&self.alias)
    }

    pub fn is_coastal(&self) -> bool {
        self.region == Region::Coastal
    }
}
