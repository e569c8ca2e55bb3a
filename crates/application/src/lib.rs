//! Application services and ports.
//!
//! Services implement the console use cases over three ports: the document
//! datastore, the control-plane cluster and the credential primitives.
//! Adapters for the ports live in the infrastructure crate.

#![forbid(unsafe_code)]

mod addon_service;
mod application_service;
mod authentication_service;
mod cluster_ports;
mod cluster_service;
mod common;
mod config_service;
mod datastore_ports;
mod definition_service;
mod env_binding_service;
mod env_service;
mod helm_service;
mod project_service;
mod rbac_service;
mod security_ports;
mod system_info_service;
mod target_service;
mod user_service;
mod workflow_service;

#[cfg(test)]
mod test_support;

pub use addon_service::{
    ADDON_ARGS_KEY, AddonService, AddonStatus, EnabledAddon, UpdateAddonRegistryInput,
};
pub use application_service::{
    ApplicationBase, ApplicationDetail, ApplicationService, ApplicationStatistics,
    CreateApplicationInput, CreateComponentInput, CreatePolicyInput, CreateTraitInput,
    DeployInput, ListApplicationOptions, UpdateApplicationInput, UpdateComponentInput,
    UpdatePolicyInput, UpdateTraitInput,
};
pub use authentication_service::{
    ACCESS_TOKEN_TTL_SECONDS, AuthenticationService, LoginInput, LoginOutcome,
    REFRESH_TOKEN_TTL_SECONDS, RefreshedTokens,
};
pub use cluster_ports::{
    ClusterClient, ConfigMapData, DefinitionCache, DefinitionMeta, DefinitionSummary,
    NamespaceInfo, label_selector, label_selector_matches,
};
pub use cluster_service::{ClusterService, CreateClusterInput, UpdateClusterInput};
pub use common::{ListPage, NameAlias, ProjectBase};
pub use config_service::{ConfigService, CreateConfigInput};
pub use datastore_ports::{
    DataStore, EntityStore, FilterOptions, FuzzyQueryOption, InQueryOption,
    IsNotExistQueryOption, ListOptions, SortOption, SortOrder, StoredRecord, count_records,
    select_records,
};
pub use definition_service::DefinitionService;
pub use env_binding_service::{EnvBindingDetail, EnvBindingService};
pub use env_service::{CreateEnvInput, EnvDetail, EnvService, NAMESPACE_USAGE_ENV, UpdateEnvInput};
pub use helm_service::{CreateHelmRepositoryInput, HelmRepositoryService};
pub use project_service::{
    AddProjectUserInput, CreateProjectInput, ProjectService, ProjectUserBase, UpdateProjectInput,
};
pub use rbac_service::{
    CreatePermissionInput, CreateRoleInput, RbacService, RoleView, UpdatePermissionInput,
    UpdateRoleInput,
};
pub use security_ports::{GrantType, PasswordHasher, TokenClaims, TokenIssuer};
pub use system_info_service::{SystemInfoService, UpdateSystemInfoInput};
pub use target_service::{CreateTargetInput, TargetService, UpdateTargetInput};
pub use user_service::{
    ADMIN_PASSWORD_SECRET_NAME, CreateUserInput, ListUserOptions, LoginUserInfo, UpdateUserInput,
    UserBase, UserDetail, UserService,
};
pub use workflow_service::{CreateWorkflowInput, EnvWorkflow, WorkflowService};
