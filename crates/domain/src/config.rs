//! Integration configs: credentials and endpoints other resources refer to.
//!
//! A config type is a ComponentDefinition carrying the config catalog label.
//! A config is an Application CR in the system namespace whose single
//! component has the config type.

use serde::{Deserialize, Serialize};

/// Label value marking config types and configs.
pub const VELA_CORE_CONFIG: &str = "velacore-config";

/// Label on config Applications carrying [`VELA_CORE_CONFIG`].
pub const LABEL_CONFIG_CATALOG: &str = "config.oam.dev/catalog";

/// Label on config Applications naming their config type.
pub const LABEL_CONFIG_TYPE: &str = "config.oam.dev/type";

/// Label on config Applications naming their project.
pub const LABEL_CONFIG_PROJECT: &str = "config.oam.dev/project";

/// Label on ComponentDefinitions carrying [`VELA_CORE_CONFIG`].
pub const LABEL_DEFINITION_CONFIG_CATALOG: &str =
    "custom.definition.oam.dev/catalog.config.oam.dev";

/// Label on ComponentDefinitions grouping config types.
pub const LABEL_DEFINITION_CONFIG_TYPE: &str = "custom.definition.oam.dev/type.config.oam.dev";

/// Annotation on ComponentDefinitions carrying the config type alias.
pub const ANNOTATION_DEFINITION_CONFIG_ALIAS: &str =
    "custom.definition.oam.dev/alias.config.oam.dev";

/// Annotation on ComponentDefinitions carrying their description.
pub const ANNOTATION_DEFINITION_DESCRIPTION: &str = "definition.oam.dev/description";

/// Source-of-truth label value of resources the console creates for itself.
pub const SOURCE_OF_TRUTH_FROM_INNER: &str = "from-inner";

/// Config type grouping every Terraform provider definition.
pub const TERRAFORM_PROVIDER_CONFIG_TYPE: &str = "terraform-provider";

/// Alias of [`TERRAFORM_PROVIDER_CONFIG_TYPE`].
pub const TERRAFORM_PROVIDER_ALIAS: &str = "Terraform Cloud Provider";

/// Prefix of Terraform provider component types.
pub const TERRAFORM_COMPONENT_PREFIX: &str = "terraform-";

/// Annotation carrying the alias of a config.
pub const ANNOTATION_CONFIG_ALIAS: &str = "config.oam.dev/alias";

/// Annotation carrying the description of a config.
pub const ANNOTATION_CONFIG_DESCRIPTION: &str = "config.oam.dev/description";

/// A kind of config the console can create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigType {
    /// Config type name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Description.
    pub description: String,
    /// ComponentDefinitions implementing the type.
    pub definitions: Vec<String>,
}

/// Readiness of a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigStatus {
    /// The config application is running.
    #[serde(rename = "Ready")]
    Ready,
    /// The config application is not running yet.
    #[serde(rename = "Not ready")]
    NotReady,
}

impl ConfigStatus {
    /// Derives readiness from the phase of the config application.
    #[must_use]
    pub fn from_app_phase(phase: Option<&str>) -> Self {
        if phase == Some("running") {
            Self::Ready
        } else {
            Self::NotReady
        }
    }
}

/// One config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Config type name.
    pub config_type: String,
    /// Config name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Description.
    pub description: String,
    /// Project the config is scoped to, empty for every project.
    pub project: String,
    /// Phase of the config application.
    pub application_status: String,
    /// Readiness.
    pub status: ConfigStatus,
}
