//! Helm chart repositories.
//!
//! A repository is a labeled ConfigMap in the system namespace. Basic-auth
//! passwords go to a Secret of the same name.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use vela_console_core::{AppError, AppResult, NonEmptyString};
use vela_console_domain::{
    HELM_REPOSITORY_CONFIG_TYPE, HelmRepository, LABEL_CONFIG_PROJECT, LABEL_CONFIG_TYPE,
    helm_repository_config_map,
};

use crate::cluster_ports::{ClusterClient, ConfigMapData, label_selector};

const URL_KEY: &str = "url";
const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";
const URL_SCHEMES: [&str; 3] = ["http://", "https://", "oci://"];

/// Input payload for registering a Helm repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateHelmRepositoryInput {
    /// Unique repository name.
    pub name: String,
    /// Repository URL.
    pub url: String,
    /// Owning project, empty for every project.
    pub project: String,
    /// Basic-auth user name.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

/// Application service for Helm repositories.
#[derive(Clone)]
pub struct HelmRepositoryService {
    cluster: Arc<dyn ClusterClient>,
    system_namespace: String,
}

fn from_config_map(config_map: ConfigMapData) -> HelmRepository {
    let ConfigMapData {
        labels, mut data, ..
    } = config_map;
    HelmRepository {
        name: data.remove("name").unwrap_or_default(),
        url: data.remove(URL_KEY).unwrap_or_default(),
        project: labels.get(LABEL_CONFIG_PROJECT).cloned().unwrap_or_default(),
        username: data.remove(USERNAME_KEY).unwrap_or_default(),
    }
}

impl HelmRepositoryService {
    /// Creates a new Helm repository service.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>, system_namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            system_namespace: system_namespace.into(),
        }
    }

    /// Registers a repository.
    pub async fn create_helm_repository(
        &self,
        input: CreateHelmRepositoryInput,
    ) -> AppResult<HelmRepository> {
        let name = NonEmptyString::required("helm repository name", input.name)?;
        let url = NonEmptyString::required("helm repository url", input.url)?;
        if !URL_SCHEMES
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(AppError::Validation(format!(
                "helm repository url '{url}' must use http, https or oci"
            )));
        }

        let config_map_name = helm_repository_config_map(&name);
        if self
            .cluster
            .get_config_map(&self.system_namespace, &config_map_name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "the helm repository is exist".to_owned(),
            ));
        }

        let mut labels = BTreeMap::from([(
            LABEL_CONFIG_TYPE.to_owned(),
            HELM_REPOSITORY_CONFIG_TYPE.to_owned(),
        )]);
        if !input.project.is_empty() {
            labels.insert(LABEL_CONFIG_PROJECT.to_owned(), input.project.clone());
        }
        let mut data = BTreeMap::from([
            ("name".to_owned(), name.clone()),
            (URL_KEY.to_owned(), url.clone()),
        ]);
        if !input.username.is_empty() {
            data.insert(USERNAME_KEY.to_owned(), input.username.clone());
        }

        if !input.password.is_empty() {
            self.cluster
                .put_secret(
                    &self.system_namespace,
                    &config_map_name,
                    BTreeMap::from([
                        (USERNAME_KEY.to_owned(), input.username.clone()),
                        (PASSWORD_KEY.to_owned(), input.password),
                    ]),
                )
                .await?;
        }
        self.cluster
            .put_config_map(
                &self.system_namespace,
                ConfigMapData {
                    name: config_map_name,
                    labels,
                    data,
                },
            )
            .await?;

        info!(repository = %name, project = %input.project, "registered helm repository");
        Ok(HelmRepository {
            name,
            url,
            project: input.project,
            username: input.username,
        })
    }

    /// Lists the repositories visible to a project: platform repositories
    /// plus the project's own. An empty project lists every repository.
    pub async fn list_helm_repositories(&self, project: &str) -> AppResult<Vec<HelmRepository>> {
        let selector = label_selector(&[(LABEL_CONFIG_TYPE, HELM_REPOSITORY_CONFIG_TYPE)]);
        let mut repositories: Vec<HelmRepository> = self
            .cluster
            .list_config_maps(&self.system_namespace, &selector)
            .await?
            .into_iter()
            .map(from_config_map)
            .filter(|repository| {
                project.is_empty() || repository.project.is_empty() || repository.project == project
            })
            .collect();
        repositories.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(repositories)
    }

    /// Returns one repository.
    pub async fn get_helm_repository(&self, name: &str) -> AppResult<HelmRepository> {
        self.cluster
            .get_config_map(&self.system_namespace, &helm_repository_config_map(name))
            .await?
            .filter(|config_map| {
                config_map.labels.get(LABEL_CONFIG_TYPE).map(String::as_str)
                    == Some(HELM_REPOSITORY_CONFIG_TYPE)
            })
            .map(from_config_map)
            .ok_or_else(|| AppError::NotFound("the helm repository is not exist".to_owned()))
    }

    /// Removes a repository and its credentials.
    pub async fn delete_helm_repository(&self, name: &str) -> AppResult<()> {
        self.get_helm_repository(name).await?;
        let config_map_name = helm_repository_config_map(name);
        self.cluster
            .delete_config_map(&self.system_namespace, &config_map_name)
            .await?;
        self.cluster
            .delete_secret(&self.system_namespace, &config_map_name)
            .await?;
        info!(repository = name, "deleted helm repository");
        Ok(())
    }
}
