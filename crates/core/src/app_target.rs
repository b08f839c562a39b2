//! Requested mobile platform and deployment target of a project.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// AppType
// ---------------------------------------------------------------------------

/// Target platform(s) for the generated app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppType {
    #[default]
    Android,
    Ios,
    Both,
}

impl AppType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Android => "ANDROID",
            Self::Ios => "IOS",
            Self::Both => "BOTH",
        }
    }

    /// Whether an Android build is part of the output.
    pub fn includes_android(self) -> bool {
        matches!(self, Self::Android | Self::Both)
    }

    /// Whether an iOS build is part of the output.
    pub fn includes_ios(self) -> bool {
        matches!(self, Self::Ios | Self::Both)
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANDROID" => Ok(Self::Android),
            "IOS" => Ok(Self::Ios),
            "BOTH" => Ok(Self::Both),
            _ => Err(CoreError::Validation(format!(
                "Invalid app_type: '{s}'. Must be one of: ANDROID, IOS, BOTH"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DeploymentOption
// ---------------------------------------------------------------------------

/// Where the finished app should be deployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentOption {
    /// The owner has not picked a target; the pipeline finishes without a
    /// live deploy.
    #[default]
    NotChosen,
    /// Hosted download on the platform CDN.
    Applaude,
    /// Submission to the public app stores.
    AppStores,
}

impl DeploymentOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotChosen => "NOT_CHOSEN",
            Self::Applaude => "APPLAUDE",
            Self::AppStores => "APP_STORES",
        }
    }

    pub fn is_chosen(self) -> bool {
        self != Self::NotChosen
    }
}

impl fmt::Display for DeploymentOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentOption {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_CHOSEN" => Ok(Self::NotChosen),
            "APPLAUDE" => Ok(Self::Applaude),
            "APP_STORES" => Ok(Self::AppStores),
            _ => Err(CoreError::Validation(format!(
                "Invalid deployment_option: '{s}'. Must be one of: NOT_CHOSEN, APPLAUDE, APP_STORES"
            ))),
        }
    }
}
