use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use vela_console_application::{
    AddonService, ApplicationService, AuthenticationService, ClusterClient, ClusterService,
    ConfigService, DataStore, DefinitionCache, DefinitionMeta, DefinitionService,
    DefinitionSummary, EntityStore, EnvBindingService, EnvService, HelmRepositoryService,
    ProjectService, RbacService, SystemInfoService, TargetService, UserService, WorkflowService,
};
use vela_console_domain::{LABEL_DEFINITION_CONFIG_CATALOG, VELA_CORE_CONFIG};
use vela_console_core::AppError;
use vela_console_infrastructure::{
    Argon2PasswordHasher, InMemoryClusterClient, InMemoryDataStore, InMemoryDefinitionCache,
    JwtTokenIssuer, KubeClusterClient, PostgresDataStore, RedisDefinitionCache,
};

use crate::bootstrap_config::{BootstrapConfig, ClusterMode, DataStoreConfig};

/// Every console service wired over the configured adapters.
pub struct ConsoleServices {
    pub system_info: SystemInfoService,
    pub rbac: RbacService,
    pub users: UserService,
    pub authentication: AuthenticationService,
    pub targets: TargetService,
    pub envs: EnvService,
    pub projects: ProjectService,
    pub applications: ApplicationService,
    pub clusters: ClusterService,
    pub configs: ConfigService,
    pub addons: AddonService,
    pub helm_repositories: HelmRepositoryService,
    pub cluster: Arc<dyn ClusterClient>,
}

impl ConsoleServices {
    pub async fn build(config: &BootstrapConfig) -> Result<Self, AppError> {
        let store = EntityStore::new(build_data_store(&config.datastore).await?);
        let cluster = build_cluster_client(config).await?;
        let definitions = DefinitionService::new(cluster.clone()).with_definition_cache(
            build_definition_cache(config)?,
            config.definition_cache_ttl_seconds,
        );
        let password_hasher = Arc::new(Argon2PasswordHasher::new());

        let system_info = SystemInfoService::new(store.clone());
        let rbac = RbacService::new(store.clone());
        let users = UserService::new(
            store.clone(),
            password_hasher.clone(),
            cluster.clone(),
            system_info.clone(),
            rbac.clone(),
            config.system_namespace.clone(),
        );
        let authentication = AuthenticationService::new(
            password_hasher,
            Arc::new(JwtTokenIssuer::new(&config.jwt_signing_key)),
            system_info.clone(),
            users.clone(),
        );
        let targets = TargetService::new(store.clone(), cluster.clone());
        let workflows = WorkflowService::new(store.clone(), definitions.clone());
        let envs = EnvService::new(
            store.clone(),
            cluster.clone(),
            workflows.clone(),
            rbac.clone(),
        );
        let env_bindings =
            EnvBindingService::new(store.clone(), cluster.clone(), workflows.clone());
        let projects = ProjectService::new(
            store.clone(),
            rbac.clone(),
            targets.clone(),
            envs.clone(),
        );
        let clusters = ClusterService::new(
            store.clone(),
            cluster.clone(),
            config.system_namespace.clone(),
        );
        let configs = ConfigService::new(cluster.clone(), config.system_namespace.clone());
        let addons = AddonService::new(cluster.clone(), config.system_namespace.clone());
        let helm_repositories =
            HelmRepositoryService::new(cluster.clone(), config.system_namespace.clone());
        let applications = ApplicationService::new(
            store,
            cluster.clone(),
            workflows,
            env_bindings,
            definitions,
            rbac.clone(),
        );

        Ok(Self {
            system_info,
            rbac,
            users,
            authentication,
            targets,
            envs,
            projects,
            applications,
            clusters,
            configs,
            addons,
            helm_repositories,
            cluster,
        })
    }
}

async fn build_data_store(config: &DataStoreConfig) -> Result<Arc<dyn DataStore>, AppError> {
    match config {
        DataStoreConfig::Memory => {
            info!("using in-memory datastore");
            Ok(Arc::new(InMemoryDataStore::new()))
        }
        DataStoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

            info!("using postgres datastore");
            Ok(Arc::new(PostgresDataStore::new(pool)))
        }
    }
}

async fn build_cluster_client(config: &BootstrapConfig) -> Result<Arc<dyn ClusterClient>, AppError> {
    match config.cluster_mode {
        ClusterMode::Kube => {
            let client = kube::Client::try_default().await.map_err(|error| {
                AppError::Internal(format!("failed to build kubernetes client: {error}"))
            })?;
            info!(system_namespace = %config.system_namespace, "using kubernetes cluster");
            Ok(Arc::new(KubeClusterClient::new(
                client,
                config.system_namespace.clone(),
            )))
        }
        ClusterMode::Memory => {
            let cluster = InMemoryClusterClient::new();
            for (name, workload_type, workload_kind) in [
                ("webservice", "deployments.apps", "Deployment"),
                ("worker", "deployments.apps", "Deployment"),
                ("task", "jobs.batch", "Job"),
            ] {
                cluster
                    .register_definition(DefinitionSummary {
                        name: name.to_owned(),
                        workload_type: workload_type.to_owned(),
                        workload_kind: workload_kind.to_owned(),
                    })
                    .await;
            }
            cluster
                .register_definition_meta(DefinitionMeta {
                    name: "config-image-registry".to_owned(),
                    labels: [(
                        LABEL_DEFINITION_CONFIG_CATALOG.to_owned(),
                        VELA_CORE_CONFIG.to_owned(),
                    )]
                    .into(),
                    ..DefinitionMeta::default()
                })
                .await;
            info!("using in-memory cluster");
            Ok(Arc::new(cluster))
        }
    }
}

fn build_definition_cache(config: &BootstrapConfig) -> Result<Arc<dyn DefinitionCache>, AppError> {
    match &config.redis {
        Some(redis_config) => {
            let client = redis::Client::open(redis_config.url.as_str())
                .map_err(|error| AppError::Validation(format!("invalid VELA_REDIS_URL: {error}")))?;
            Ok(Arc::new(RedisDefinitionCache::new(
                client,
                redis_config.key_prefix.clone(),
            )))
        }
        None => Ok(Arc::new(InMemoryDefinitionCache::new())),
    }
}
