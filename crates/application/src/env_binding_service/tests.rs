use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    Application, ApplicationManifest, ApplicationPolicy, ApplicationRevision, Env, EnvBinding,
    ObjectMeta, RevisionStatus,
};

use crate::application_service::{CreateApplicationInput, CreateComponentInput};
use crate::datastore_ports::ListOptions;
use crate::env_service::CreateEnvInput;
use crate::target_service::CreateTargetInput;
use crate::test_support::{TestConsole, actor};

/// Starts a console with targets `qa` and `prod`, environments `test` and
/// `live` on them, and an unbound application `shop`.
async fn console_with_app() -> AppResult<(TestConsole, Application)> {
    let console = TestConsole::started().await?;
    for (target, env) in [("qa", "test"), ("prod", "live")] {
        console
            .targets
            .create_target(CreateTargetInput {
                name: target.to_owned(),
                project: "default".to_owned(),
                ..CreateTargetInput::default()
            })
            .await?;
        console
            .envs
            .create_env(CreateEnvInput {
                name: env.to_owned(),
                alias: env.to_uppercase(),
                project: "default".to_owned(),
                targets: vec![target.to_owned()],
                ..CreateEnvInput::default()
            })
            .await?;
    }
    console
        .applications
        .create_application(
            &actor("admin"),
            CreateApplicationInput {
                name: "shop".to_owned(),
                project: "default".to_owned(),
                component: Some(CreateComponentInput {
                    name: "web".to_owned(),
                    component_type: "webservice".to_owned(),
                    ..CreateComponentInput::default()
                }),
                ..CreateApplicationInput::default()
            },
        )
        .await?;
    let app = console.applications.get_application("shop").await?;
    Ok((console, app))
}

async fn env_policies(console: &TestConsole, env_name: &str) -> AppResult<Vec<String>> {
    Ok(console
        .store
        .list(
            &ApplicationPolicy {
                app_primary_key: "shop".to_owned(),
                env_name: env_name.to_owned(),
                ..ApplicationPolicy::default()
            },
            &ListOptions::default(),
        )
        .await?
        .into_iter()
        .map(|policy| policy.name)
        .collect())
}

async fn mark_deployed(console: &TestConsole, namespace: &str) {
    let manifest = ApplicationManifest::new(ObjectMeta {
        name: "shop".to_owned(),
        namespace: namespace.to_owned(),
        ..ObjectMeta::default()
    });
    console
        .cluster
        .applications
        .lock()
        .await
        .insert((namespace.to_owned(), "shop".to_owned()), manifest);
}

#[tokio::test]
async fn create_env_binding_generates_the_env_workflow() -> AppResult<()> {
    let (console, app) = console_with_app().await?;

    let detail = console.env_bindings.create_env_binding(&app, "test").await?;

    assert_eq!(detail.workflow_name, "workflow-test");
    assert_eq!(detail.env.name, "test");
    assert_eq!(detail.targets.len(), 1);
    assert!(!detail.app_deployed);

    let workflow = console
        .workflows
        .get_workflow(&app, "workflow-test")
        .await?
        .ok_or_else(|| AppError::NotFound("workflow".to_owned()))?;
    assert_eq!(workflow.alias, "TEST Workflow");
    assert_eq!(workflow.env_name, "test");
    assert_eq!(workflow.default, Some(false));
    assert_eq!(workflow.steps.len(), 1);
    assert_eq!(env_policies(&console, "test").await?, vec!["qa".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn create_env_binding_rejects_duplicates_and_missing_envs() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console.env_bindings.create_env_binding(&app, "test").await?;

    assert!(matches!(
        console.env_bindings.create_env_binding(&app, "test").await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        console.env_bindings.create_env_binding(&app, "missing").await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn failed_policy_write_removes_the_env_workflow() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console
        .store
        .add(ApplicationPolicy {
            env_name: "elsewhere".to_owned(),
            ..ApplicationPolicy::key("shop", "qa")
        })
        .await?;

    assert!(matches!(
        console.env_bindings.create_env_binding(&app, "test").await,
        Err(AppError::Conflict(_))
    ));
    assert!(
        console
            .workflows
            .get_workflow(&app, "workflow-test")
            .await?
            .is_none()
    );
    assert!(
        !console
            .store
            .is_exist(&EnvBinding::key("shop", "test"))
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn batch_create_makes_the_first_workflow_default() -> AppResult<()> {
    let (console, app) = console_with_app().await?;

    console
        .env_bindings
        .batch_create_env_binding(&app, &["live".to_owned(), "test".to_owned()])
        .await?;

    let default = console
        .workflows
        .get_application_default_workflow(&app)
        .await?;
    assert_eq!(default.name, "workflow-live");
    assert_eq!(console.env_bindings.list_env_bindings(&app).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn delete_env_binding_requires_recycling_first() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console.env_bindings.create_env_binding(&app, "test").await?;
    mark_deployed(&console, "test").await;

    assert!(
        console
            .env_bindings
            .detail_env_binding(&app, "test")
            .await?
            .app_deployed
    );
    assert!(matches!(
        console.env_bindings.delete_env_binding(&app, "test").await,
        Err(AppError::Conflict(_))
    ));

    console
        .env_bindings
        .application_recycle_env(&app, "test")
        .await?;
    console.env_bindings.delete_env_binding(&app, "test").await?;

    assert!(
        console
            .workflows
            .get_workflow(&app, "workflow-test")
            .await?
            .is_none()
    );
    assert!(env_policies(&console, "test").await?.is_empty());
    assert!(matches!(
        console.env_bindings.detail_env_binding(&app, "test").await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn unbinding_tolerates_an_already_removed_env_workflow() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console.env_bindings.create_env_binding(&app, "test").await?;
    console.workflows.delete_workflow(&app, "workflow-test").await?;

    console.env_bindings.delete_env_binding(&app, "test").await?;
    assert!(env_policies(&console, "test").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn recycle_terminates_running_revisions_of_the_env() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console.env_bindings.create_env_binding(&app, "test").await?;
    mark_deployed(&console, "test").await;
    for (version, env_name) in [("v1", "test"), ("v2", "live")] {
        console
            .store
            .add(ApplicationRevision {
                status: Some(RevisionStatus::Running),
                env_name: env_name.to_owned(),
                ..ApplicationRevision::key("shop", version)
            })
            .await?;
    }

    console
        .env_bindings
        .application_recycle_env(&app, "test")
        .await?;

    assert!(console.cluster.applications.lock().await.is_empty());
    let v1 = console
        .store
        .get(&ApplicationRevision::key("shop", "v1"))
        .await?;
    let v2 = console
        .store
        .get(&ApplicationRevision::key("shop", "v2"))
        .await?;
    assert_eq!(v1.and_then(|revision| revision.status), Some(RevisionStatus::Terminated));
    assert_eq!(v2.and_then(|revision| revision.status), Some(RevisionStatus::Running));
    Ok(())
}

#[tokio::test]
async fn list_env_bindings_skips_missing_envs() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console
        .env_bindings
        .batch_create_env_binding(&app, &["test".to_owned(), "live".to_owned()])
        .await?;
    console.store.delete(&Env::key("live")).await?;

    let bindings = console.env_bindings.list_env_bindings(&app).await?;

    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].env.name, "test");
    Ok(())
}

#[tokio::test]
async fn update_env_binding_follows_the_env_targets() -> AppResult<()> {
    let (console, app) = console_with_app().await?;
    console.env_bindings.create_env_binding(&app, "test").await?;
    let mut env = console.envs.get_env("test").await?;
    env.targets.clear();
    console.store.put(env).await?;

    let detail = console.env_bindings.update_env_binding(&app, "test").await?;

    assert!(detail.targets.is_empty());
    let workflow = console
        .workflows
        .get_workflow(&app, "workflow-test")
        .await?
        .ok_or_else(|| AppError::NotFound("workflow".to_owned()))?;
    assert!(workflow.steps.is_empty());
    assert!(env_policies(&console, "test").await?.is_empty());
    Ok(())
}
