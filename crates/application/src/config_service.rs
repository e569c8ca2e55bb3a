//! Integration configs and their types.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    ANNOTATION_CONFIG_ALIAS, ANNOTATION_CONFIG_DESCRIPTION, ANNOTATION_DEFINITION_CONFIG_ALIAS,
    ANNOTATION_DEFINITION_DESCRIPTION, AppComponent, ApplicationManifest, Config, ConfigStatus,
    ConfigType, JsonObject, LABEL_CONFIG_CATALOG, LABEL_CONFIG_PROJECT, LABEL_CONFIG_TYPE,
    LABEL_DEFINITION_CONFIG_CATALOG, LABEL_DEFINITION_CONFIG_TYPE, LABEL_SOURCE_OF_TRUTH,
    LOCAL_CLUSTER_NAME, ObjectMeta, SOURCE_OF_TRUTH_FROM_INNER, TERRAFORM_COMPONENT_PREFIX,
    TERRAFORM_PROVIDER_ALIAS, TERRAFORM_PROVIDER_CONFIG_TYPE, VELA_CORE_CONFIG,
};

use crate::cluster_ports::{ClusterClient, DefinitionMeta, label_selector};

/// Input payload for creating a config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateConfigInput {
    /// Unique config name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Project the config is scoped to, empty for every project.
    pub project: String,
    /// Config type, the name of a config ComponentDefinition.
    pub component_type: String,
    /// Config parameters.
    pub properties: JsonObject,
}

/// Application service for configs.
#[derive(Clone)]
pub struct ConfigService {
    cluster: Arc<dyn ClusterClient>,
    system_namespace: String,
}

fn annotation(meta: &DefinitionMeta, key: &str) -> String {
    meta.annotations.get(key).cloned().unwrap_or_default()
}

fn is_terraform_provider(meta: &DefinitionMeta) -> bool {
    meta.labels.get(LABEL_DEFINITION_CONFIG_TYPE).map(String::as_str)
        == Some(TERRAFORM_PROVIDER_CONFIG_TYPE)
}

fn definition_type(meta: &DefinitionMeta) -> ConfigType {
    ConfigType {
        name: meta.name.clone(),
        alias: annotation(meta, ANNOTATION_DEFINITION_CONFIG_ALIAS),
        description: annotation(meta, ANNOTATION_DEFINITION_DESCRIPTION),
        definitions: vec![meta.name.clone()],
    }
}

fn terraform_type(definitions: Vec<String>) -> ConfigType {
    ConfigType {
        name: TERRAFORM_PROVIDER_CONFIG_TYPE.to_owned(),
        alias: TERRAFORM_PROVIDER_ALIAS.to_owned(),
        description: String::new(),
        definitions,
    }
}

fn to_config(app: &ApplicationManifest) -> Config {
    let text = |value: Option<&str>| value.unwrap_or_default().to_owned();
    Config {
        config_type: text(app.label(LABEL_CONFIG_TYPE)),
        name: app.metadata.name.clone(),
        alias: text(app.annotation(ANNOTATION_CONFIG_ALIAS)),
        description: text(app.annotation(ANNOTATION_CONFIG_DESCRIPTION)),
        project: text(app.label(LABEL_CONFIG_PROJECT)),
        application_status: text(app.phase()),
        status: ConfigStatus::from_app_phase(app.phase()),
    }
}

fn type_matches(config_type: &str, app: &ApplicationManifest) -> bool {
    let actual = app.label(LABEL_CONFIG_TYPE).unwrap_or_default();
    if config_type == TERRAFORM_PROVIDER_CONFIG_TYPE {
        actual.starts_with(TERRAFORM_COMPONENT_PREFIX)
    } else {
        config_type.is_empty() || actual == config_type
    }
}

impl ConfigService {
    /// Creates a new config service over the system namespace.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>, system_namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            system_namespace: system_namespace.into(),
        }
    }

    async fn config_definitions(&self) -> AppResult<Vec<DefinitionMeta>> {
        self.cluster
            .list_component_definitions(&label_selector(&[(
                LABEL_DEFINITION_CONFIG_CATALOG,
                VELA_CORE_CONFIG,
            )]))
            .await
    }

    /// Lists config types whose name contains `query`. Every Terraform
    /// provider definition is folded into one `terraform-provider` type.
    pub async fn list_config_types(&self, query: &str) -> AppResult<Vec<ConfigType>> {
        let definitions = self.config_definitions().await?;
        let mut types = Vec::new();
        let mut providers = Vec::new();
        for meta in &definitions {
            if is_terraform_provider(meta) {
                providers.push(meta.name.clone());
            } else {
                types.push(definition_type(meta));
            }
        }
        if !providers.is_empty() {
            types.push(terraform_type(providers));
        }

        types.retain(|config_type| query.is_empty() || config_type.name.contains(query));
        types.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(types)
    }

    /// Returns one config type.
    pub async fn get_config_type(&self, name: &str) -> AppResult<ConfigType> {
        let definitions = self.config_definitions().await?;
        if name == TERRAFORM_PROVIDER_CONFIG_TYPE {
            let providers: Vec<String> = definitions
                .iter()
                .filter(|meta| is_terraform_provider(meta))
                .map(|meta| meta.name.clone())
                .collect();
            if !providers.is_empty() {
                return Ok(terraform_type(providers));
            }
        }

        definitions
            .iter()
            .find(|meta| meta.name == name)
            .map(definition_type)
            .ok_or_else(|| AppError::NotFound("the config type is not exist".to_owned()))
    }

    /// Creates a config application in the system namespace.
    pub async fn create_config(&self, input: CreateConfigInput) -> AppResult<Config> {
        let name = NonEmptyString::required("config name", input.name)?;
        let component_type = NonEmptyString::required("config type", input.component_type)?;

        let mut properties = input.properties;
        // Terraform providers are addressed by the config name.
        if component_type.starts_with(TERRAFORM_COMPONENT_PREFIX) {
            properties.insert("name".to_owned(), Value::String(name.clone()));
        }

        if self
            .cluster
            .get_application(&self.system_namespace, &name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("the config name is exist".to_owned()));
        }

        let mut labels = BTreeMap::from([
            (
                LABEL_SOURCE_OF_TRUTH.to_owned(),
                SOURCE_OF_TRUTH_FROM_INNER.to_owned(),
            ),
            (LABEL_CONFIG_CATALOG.to_owned(), VELA_CORE_CONFIG.to_owned()),
            (LABEL_CONFIG_TYPE.to_owned(), component_type.clone()),
        ]);
        if !input.project.is_empty() {
            labels.insert(LABEL_CONFIG_PROJECT.to_owned(), input.project.clone());
        }
        let mut manifest = ApplicationManifest::new(ObjectMeta {
            name: name.clone(),
            namespace: self.system_namespace.clone(),
            labels,
            annotations: BTreeMap::from([
                (ANNOTATION_CONFIG_ALIAS.to_owned(), input.alias),
                (ANNOTATION_CONFIG_DESCRIPTION.to_owned(), input.description),
            ]),
        });
        manifest.spec.components = vec![AppComponent {
            name: name.clone(),
            component_type,
            properties,
            ..AppComponent::default()
        }];

        self.cluster
            .ensure_namespace(LOCAL_CLUSTER_NAME, &self.system_namespace, &BTreeMap::new())
            .await?;
        self.cluster.apply_application(&manifest).await?;
        info!(config = %name, project = %input.project, "created config");
        Ok(to_config(&manifest))
    }

    async fn config_apps(&self, config_type: &str) -> AppResult<Vec<ApplicationManifest>> {
        let selector = label_selector(&[(LABEL_CONFIG_CATALOG, VELA_CORE_CONFIG)]);
        let mut apps: Vec<ApplicationManifest> = self
            .cluster
            .list_applications(&self.system_namespace, &selector)
            .await?
            .into_iter()
            .filter(|app| type_matches(config_type, app))
            .collect();
        apps.sort_by(|left, right| left.metadata.name.cmp(&right.metadata.name));
        Ok(apps)
    }

    /// Lists the configs of one type. `terraform-provider` lists every
    /// Terraform provider config.
    pub async fn get_configs(&self, config_type: &str) -> AppResult<Vec<Config>> {
        Ok(self.config_apps(config_type).await?.iter().map(to_config).collect())
    }

    /// Lists the configs a project can use: unscoped configs and the
    /// project's own, optionally of one type.
    pub async fn list_project_configs(
        &self,
        project: &str,
        config_type: &str,
    ) -> AppResult<Vec<Config>> {
        Ok(self
            .config_apps(config_type)
            .await?
            .iter()
            .map(to_config)
            .filter(|config| config.project.is_empty() || config.project == project)
            .collect())
    }

    async fn config_app(&self, name: &str) -> AppResult<ApplicationManifest> {
        self.cluster
            .get_application(&self.system_namespace, name)
            .await?
            .filter(|app| app.label(LABEL_CONFIG_CATALOG) == Some(VELA_CORE_CONFIG))
            .ok_or_else(|| AppError::NotFound("the config is not exist".to_owned()))
    }

    /// Returns one config.
    pub async fn get_config(&self, name: &str) -> AppResult<Config> {
        self.config_app(name).await.map(|app| to_config(&app))
    }

    /// Deletes one config.
    pub async fn delete_config(&self, name: &str) -> AppResult<()> {
        self.config_app(name).await?;
        self.cluster
            .delete_application(&self.system_namespace, name)
            .await?;
        info!(config = name, "deleted config");
        Ok(())
    }
}
