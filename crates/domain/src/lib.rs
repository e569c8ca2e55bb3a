//! Domain entities, resource-path access rules and workflow planning.

#![forbid(unsafe_code)]

mod addon;
mod application;
mod cluster;
mod config;
mod entity;
mod env;
mod oam;
mod policy;
mod project;
mod resource;
mod security;
mod target;
mod user;
mod workflow;
mod workflow_plan;

pub use addon::{
    ADDON_CATALOG_KEY, ADDON_REGISTRIES_KEY, ADDON_REGISTRY_CONFIG_MAP, ANNOTATION_ADDON_VERSION,
    AddonMeta, AddonPhase, AddonRegistry, GitAddonSource, HELM_REPOSITORY_CONFIG_TYPE,
    HelmAddonSource, HelmRepository, LABEL_ADDON_NAME, LABEL_ADDON_REGISTRY, OssAddonSource,
    addon_app_name, addon_catalog_config_map, addon_secret_name, helm_repository_config_map,
    registry_token_secret_name,
};
pub use application::{
    Application, ApplicationComponent, ApplicationPolicy, ApplicationRevision, ApplicationTrait,
    RevisionStatus, SCALER_TRAIT_TYPE, WEBSERVICE_COMPONENT_TYPE,
};
pub use cluster::{
    CLUSTER_STATUS_HEALTHY, CLUSTER_STATUS_UNHEALTHY, Cluster, cluster_credential_secret_name,
};
pub use config::{
    ANNOTATION_CONFIG_ALIAS, ANNOTATION_CONFIG_DESCRIPTION, ANNOTATION_DEFINITION_CONFIG_ALIAS,
    ANNOTATION_DEFINITION_DESCRIPTION, Config, ConfigStatus, ConfigType, LABEL_CONFIG_CATALOG,
    LABEL_CONFIG_PROJECT, LABEL_CONFIG_TYPE, LABEL_DEFINITION_CONFIG_CATALOG,
    LABEL_DEFINITION_CONFIG_TYPE, SOURCE_OF_TRUTH_FROM_INNER, TERRAFORM_COMPONENT_PREFIX,
    TERRAFORM_PROVIDER_ALIAS, TERRAFORM_PROVIDER_CONFIG_TYPE, VELA_CORE_CONFIG,
};
pub use entity::{Entity, IndexBuilder, JsonObject, Timestamps, compose_key};
pub use env::{
    DEFAULT_ENV_NAME, Env, EnvBinding, LABEL_CONTROL_PLANE_NAMESPACE_USAGE,
    LABEL_NAMESPACE_OF_ENV, LABEL_NAMESPACE_OF_PROJECT,
};
pub use oam::{
    ANNOTATION_APP_ALIAS, ANNOTATION_DEPLOY_VERSION, ANNOTATION_PUBLISH_VERSION,
    ANNOTATION_WORKFLOW_NAME, APPLICATION_API_VERSION, APPLICATION_KIND, AppComponent, AppPolicy,
    AppTrait, AppWorkflow, AppWorkflowStep, ApplicationManifest, ApplicationSpec, ApplicationStatus,
    LABEL_APP_NAME,
    LABEL_SOURCE_OF_TRUTH, ObjectMeta, SOURCE_OF_TRUTH_FROM_UX,
};
pub use policy::{
    ClusterSelector, ENV_BINDING_POLICY_DEFAULT_NAME, ENV_BINDING_POLICY_TYPE, EnvBindingSpec,
    EnvComponentPatch, EnvConfig, EnvPatch, EnvPlacement, NamespaceSelector, TOPOLOGY_POLICY_TYPE,
    TopologyPolicySpec, decode_properties, encode_properties,
};
pub use project::{
    DEFAULT_PROJECT_NAME, PROJECT_ADMIN_ROLE_NAME, PROJECT_VIEWER_ROLE_NAME, Project, ProjectUser,
};
pub use resource::{
    RequestResourceAction, ResourceName, WILDCARD, fill_path_params, resolve_resource_path,
    validate_resource_pattern,
};
pub use security::{Permission, PermissionEffect, Role};
pub use target::{
    ClusterTarget, DEFAULT_TARGET_NAME, LABEL_NAMESPACE_OF_TARGET, LOCAL_CLUSTER_NAME, Target,
};
pub use user::{
    DEFAULT_ADMIN_ROLE_NAME, DEFAULT_ADMIN_USER_NAME, LoginType, PASSWORD_MAX_LENGTH,
    PASSWORD_MIN_LENGTH, SystemInfo, User, validate_password,
};
pub use workflow::{
    DEPLOY_CLOUD_RESOURCE_STEP_TYPE, DEPLOY_STEP_TYPE, DEPLOY2ENV_STEP_TYPE,
    TERRAFORM_WORKLOAD_KIND, TERRAFORM_WORKLOAD_TYPE, Workflow, WorkflowRecord, WorkflowStep,
    env_workflow_name,
};
pub use workflow_plan::{EditState, PlannedPolicy, PlannedStep, PolicyChanges, WorkflowPlan};
