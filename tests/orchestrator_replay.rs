mod common;

use common::*;
use dockhand::docker::{
    ContainerCommandRequest, ContainerRemoveRequest, ContainerStartRequest, ContainerStatus,
    ContainerStatusRequest, DockerError, DockerOrchestrator, ExpansionContext, ImagesRequest,
    PullRequest, RunRequest, SearchPath, StopImagesRequest, SysPathRequest, Target,
};
use dockhand::gateway::ReplayGateway;
use test_tag::tag;

fn run_request() -> RunRequest {
    RunRequest::new(db1(), "mysql:5.6")
        .with_port("3306", "3306")
        .with_env("MYSQL_ROOT_PASSWORD", "**mysql**")
        .with_credential("**mysql**", "secret")
}

fn run_command(request: &RunRequest) -> String {
    request.command("docker", &ExpansionContext::new()).render()
}

#[tokio::test]
#[tag(replay)]
async fn test_image_sizes_are_normalised() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker images", IMAGES));

    let images = orchestrator
        .images(&ExpansionContext::new(), &ImagesRequest::new(local()))
        .await
        .unwrap()
        .images;

    assert_eq!(images.len(), 3);
    assert_eq!(images[0].size_bytes, 313_524_224);
    assert_eq!(images[1].size_bytes, 408 * 1024 * 1024);
    assert_eq!(images[2].size_bytes, 307_739 * 1024);
    assert_eq!(images[2].size_bytes, 315_124_736);
}

#[tokio::test]
#[tag(replay)]
async fn test_images_filter_by_repository_and_tag() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker images", IMAGES));
    let request = ImagesRequest::new(local()).with_repository("mysql").with_tag("5.6");

    let images = orchestrator
        .images(&ExpansionContext::new(), &request)
        .await
        .unwrap()
        .images;

    assert_eq!(images.len(), 1);
    assert_eq!(images[0].repository, "mysql");
    assert_eq!(images[0].tag, "5.6");
    assert_eq!(images[0].image_id, "96dc914914f5");
    assert_eq!(images[0].size_bytes, 313_524_224);
}

#[tokio::test]
#[tag(replay)]
async fn test_pull_returns_single_match() {
    let pull = docker("pull", &["mysql:5.6"]);
    let gateway = ReplayGateway::new()
        .with_response(&pull, "5.6: Pulling from library/mysql\nStatus: Image is up to date for mysql:5.6\n")
        .with_response("docker images", IMAGES);
    let orchestrator = DockerOrchestrator::new(gateway);

    let image = orchestrator
        .pull(&ExpansionContext::new(), &PullRequest::new(local(), "mysql", "5.6"))
        .await
        .unwrap();

    assert_eq!(image.image_id, "96dc914914f5");
    assert_eq!(orchestrator.gateway().commands(), vec![pull, "docker images".to_string()]);
}

#[tokio::test]
#[tag(replay)]
async fn test_pull_defaults_to_latest_tag() {
    let pull = docker("pull", &["redis:latest"]);
    let images = "REPOSITORY   TAG      IMAGE ID       CREATED       SIZE\nredis        latest   0e403e3816e8   2 days ago    113MB\n";
    let gateway = ReplayGateway::new()
        .with_response(&pull, "latest: Pulling from library/redis\n")
        .with_response("docker images", images);
    let orchestrator = DockerOrchestrator::new(gateway);

    let image = orchestrator
        .pull(&ExpansionContext::new(), &PullRequest::new(local(), "redis", ""))
        .await
        .unwrap();

    assert_eq!(image.tag, "latest");
    assert_eq!(image.size_bytes, 113 * 1024 * 1024);
}

#[tokio::test]
#[tag(replay)]
async fn test_pull_with_no_match_is_ambiguous() {
    let pull = docker("pull", &["mysql:8.0"]);
    let gateway = ReplayGateway::new()
        .with_response(&pull, "8.0: Pulling from library/mysql\n")
        .with_response("docker images", IMAGES);
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .pull(&ExpansionContext::new(), &PullRequest::new(local(), "mysql", "8.0"))
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::AmbiguousResult(_)));
    assert_eq!(error.to_string(), "failed to check image status: mysql:8.0 found: 0");
}

#[tokio::test]
#[tag(replay)]
async fn test_pull_with_two_matches_is_ambiguous() {
    let pull = docker("pull", &["mysql:5.6"]);
    let gateway = ReplayGateway::new()
        .with_response(&pull, "5.6: Pulling from library/mysql\n")
        .with_response("docker images", IMAGES_DUPLICATED);
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .pull(&ExpansionContext::new(), &PullRequest::new(local(), "mysql", "5.6"))
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::AmbiguousResult(_)));
    assert!(error.to_string().ends_with("found: 2"));
}

#[tokio::test]
#[tag(replay)]
async fn test_pull_not_found_is_cli_error() {
    let pull = docker("pull", &["nosuchimage:latest"]);
    let gateway = ReplayGateway::new().with_response(
        &pull,
        "Error: image library/nosuchimage:latest not found\n",
    );
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .pull(&ExpansionContext::new(), &PullRequest::new(local(), "nosuchimage", ""))
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::Cli(_)));
    assert_eq!(orchestrator.gateway().commands(), vec![pull]);
}

#[tokio::test]
#[tag(replay)]
async fn test_run_resets_existing_container_first() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_DB1_UP)
        .with_response("docker stop db1", "db1\n")
        .with_response("docker rm db1", "db1\n")
        .with_response(&run, "4f1c0e7d2a9b\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let info = orchestrator
        .run(&ExpansionContext::new(), &request)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(info.names, "db1");
    let commands = orchestrator.gateway().commands();
    let stop = position(&commands, "docker stop db1");
    let remove = position(&commands, "docker rm db1");
    let create = position(&commands, &run);
    assert!(stop < remove && remove < create, "unexpected order: {commands:#?}");
    assert_eq!(commands.last().map(String::as_str), Some("docker ps -a"));
}

#[tokio::test]
#[tag(replay)]
async fn test_run_stops_when_remove_fails_after_stop() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_DB1_UP)
        .with_response("docker stop db1", "db1\n")
        .with_response(
            "docker rm db1",
            "Error response from daemon: removal of container db1 is already in progress\n",
        )
        .with_response(&run, "4f1c0e7d2a9b\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .run(&ExpansionContext::new(), &request)
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::Cli(_)));
    assert!(error.to_string().contains("docker rm db1"), "unexpected error: {error}");
    let commands = orchestrator.gateway().commands();
    assert!(commands.contains(&"docker stop db1".to_string()));
    assert!(!commands.contains(&run), "create issued after failed remove: {commands:#?}");
}

#[tokio::test]
#[tag(replay)]
async fn test_run_resets_stopped_container_too() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_DB1_DOWN)
        .with_response("docker ps -a", PS_DB1_DOWN)
        .with_response("docker ps -a", PS_DB1_UP)
        .with_response("docker stop db1", "db1\n")
        .with_response("docker rm db1", "db1\n")
        .with_response(&run, "4f1c0e7d2a9b\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let info = orchestrator
        .run(&ExpansionContext::new(), &request)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(info.status, ContainerStatus::Up);
    let commands = orchestrator.gateway().commands();
    assert!(position(&commands, "docker rm db1") < position(&commands, &run));
}

#[tokio::test]
#[tag(replay)]
async fn test_run_retries_once_on_name_conflict() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_EMPTY)
        .with_response("docker ps -a", PS_DB1_DOWN)
        .with_response("docker ps -a", PS_DB1_UP)
        .with_response(&run, NAME_CONFLICT)
        .with_response(&run, "4f1c0e7d2a9b\n")
        .with_response("docker stop db1", "db1\n")
        .with_response("docker rm db1", "db1\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let info = orchestrator
        .run(&ExpansionContext::new(), &request)
        .await
        .unwrap()
        .unwrap();

    assert!(info.is_running());
    assert_eq!(
        orchestrator.gateway().commands(),
        vec![
            "docker ps -a".to_string(),
            run.clone(),
            "docker ps -a".to_string(),
            "docker stop db1".to_string(),
            "docker rm db1".to_string(),
            run,
            "docker ps -a".to_string(),
        ]
    );
}

#[tokio::test]
#[tag(replay)]
async fn test_run_does_not_retry_twice() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_EMPTY)
        .with_response(&run, NAME_CONFLICT)
        .with_response("docker rm db1", "Error: No such container: db1\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .run(&ExpansionContext::new(), &request)
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::Cli(_)));
    let commands = orchestrator.gateway().commands();
    assert_eq!(commands.iter().filter(|command| **command == run).count(), 2);
    assert_eq!(commands.last(), Some(&run));
}

#[tokio::test]
#[tag(replay)]
async fn test_run_passes_credentials_without_secrets_in_command() {
    let request = run_request();
    let run = run_command(&request);
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_EMPTY)
        .with_response(&run, "4f1c0e7d2a9b\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    orchestrator.run(&ExpansionContext::new(), &request).await.unwrap();

    let calls = orchestrator.gateway().calls();
    let create = calls.iter().find(|call| call.command == run).unwrap();
    assert!(create.command.contains("**mysql**"));
    assert!(!create.command.contains("secret"));
    assert_eq!(create.credential_keys, vec!["**mysql**".to_string()]);
}

#[tokio::test]
#[tag(replay)]
async fn test_run_requires_image_and_name() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new());
    let ctx = ExpansionContext::new();

    let no_image = RunRequest::new(db1(), "");
    assert!(matches!(
        orchestrator.run(&ctx, &no_image).await,
        Err(DockerError::Validation(_))
    ));

    let no_name = RunRequest::new(local(), "mysql:5.6");
    assert!(matches!(
        orchestrator.run(&ctx, &no_name).await,
        Err(DockerError::Validation(_))
    ));
    assert!(orchestrator.gateway().commands().is_empty());
}

#[tokio::test]
#[tag(replay)]
async fn test_stop_images_only_stops_matching_containers() {
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_MIXED)
        .with_response("docker stop db1", "db1\n");
    let orchestrator = DockerOrchestrator::new(gateway);
    let request = StopImagesRequest {
        target: local(),
        images: vec!["mysql".to_string()],
        ..Default::default()
    };

    let response = orchestrator
        .stop_images(&ExpansionContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.stopped_images, vec!["mysql:5.6".to_string()]);
    let commands = orchestrator.gateway().commands();
    assert!(commands.contains(&"docker stop db1".to_string()));
    assert!(!commands.contains(&"docker stop cache".to_string()));
}

#[tokio::test]
#[tag(replay)]
async fn test_stop_images_skips_exited_containers() {
    let gateway = ReplayGateway::new()
        .with_response("docker ps -a", PS_DB1_DOWN)
        .with_response("docker stop db1", "db1\n");
    let orchestrator = DockerOrchestrator::new(gateway);
    let request = StopImagesRequest {
        target: local(),
        images: vec!["mysql".to_string()],
        ..Default::default()
    };

    let response = orchestrator
        .stop_images(&ExpansionContext::new(), &request)
        .await
        .unwrap();

    assert!(response.stopped_images.is_empty());
    assert_eq!(orchestrator.gateway().commands(), vec!["docker ps -a".to_string()]);
}

#[tokio::test]
#[tag(replay)]
async fn test_status_is_idempotent() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker ps -a", PS_MIXED));
    let ctx = ExpansionContext::new();
    let request = ContainerStatusRequest::new(local());

    let first = orchestrator.status(&ctx, &request).await.unwrap();
    let second = orchestrator.status(&ctx, &request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.containers.len(), 2);
}

#[tokio::test]
#[tag(replay)]
async fn test_status_filters_by_image_and_name() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker ps -a", PS_MIXED));
    let ctx = ExpansionContext::new();

    let by_image = orchestrator
        .status(&ctx, &ContainerStatusRequest::new(local()).with_image("redis:4"))
        .await
        .unwrap();
    assert_eq!(by_image.containers.len(), 1);
    assert_eq!(by_image.containers[0].names, "cache");

    let missing = orchestrator
        .status(&ctx, &ContainerStatusRequest::new(local()).with_names("web"))
        .await
        .unwrap();
    assert!(missing.containers.is_empty());
}

#[tokio::test]
#[tag(replay)]
async fn test_status_single_requires_exactly_one() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker ps -a", PS_MIXED));
    let ctx = ExpansionContext::new();
    let path = SearchPath::default();

    let found = orchestrator.status_single(&ctx, &db1(), &path).await.unwrap();
    assert_eq!(found.map(|info| info.container_id), Some("b5bcc949f075".to_string()));

    let missing = orchestrator
        .status_single(&ctx, &local().with_name("web"), &path)
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
#[tag(replay)]
async fn test_start_verifies_state() {
    let gateway = ReplayGateway::new()
        .with_response("docker start db1", "db1\n")
        .with_response("docker ps -a", PS_DB1_UP);
    let orchestrator = DockerOrchestrator::new(gateway);
    let request = ContainerStartRequest {
        target: db1(),
        ..Default::default()
    };

    let info = orchestrator
        .start(&ExpansionContext::new(), &request)
        .await
        .unwrap()
        .unwrap();

    assert!(info.is_running());
    assert_eq!(info.port, "0.0.0.0:3306->3306/tcp");
    assert_eq!(
        orchestrator.gateway().commands(),
        vec!["docker start db1".to_string(), "docker ps -a".to_string()]
    );
}

#[tokio::test]
#[tag(replay)]
async fn test_remove_returns_raw_output() {
    let orchestrator = DockerOrchestrator::new(ReplayGateway::new().with_response("docker rm db1", "db1\n"));
    let request = ContainerRemoveRequest {
        target: db1(),
        ..Default::default()
    };

    let response = orchestrator
        .remove(&ExpansionContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.stdout(), "db1\n");
    assert_eq!(orchestrator.gateway().commands(), vec!["docker rm db1".to_string()]);
}

#[tokio::test]
#[tag(replay)]
async fn test_search_path_persists_across_actions() {
    let gateway = ReplayGateway::new()
        .with_response("docker images", IMAGES)
        .with_response("docker ps -a", PS_EMPTY);
    let orchestrator = DockerOrchestrator::new(gateway);
    let ctx = ExpansionContext::new();
    let custom = SearchPath::new(["/opt/docker/bin"]);

    orchestrator
        .set_search_path(&SysPathRequest {
            sys_path: custom.clone(),
        })
        .await;
    orchestrator.images(&ctx, &ImagesRequest::new(local())).await.unwrap();

    let override_path = SearchPath::new(["/usr/local/bin"]);
    orchestrator
        .status(
            &ctx,
            &ContainerStatusRequest::new(local()).with_sys_path(override_path.clone()),
        )
        .await
        .unwrap();
    orchestrator.images(&ctx, &ImagesRequest::new(local())).await.unwrap();

    let calls = orchestrator.gateway().calls();
    assert_eq!(calls[0].search_path, custom);
    assert_eq!(calls[1].search_path, override_path);
    assert_eq!(calls[2].search_path, override_path);
    assert_eq!(orchestrator.search_path().await, override_path);
}

#[tokio::test]
#[tag(replay)]
async fn test_exec_drops_password_transcript() {
    let target = Target::new("ssh://10.0.0.5:22/", "ops.json").with_name("db1");
    let gateway = ReplayGateway::new().with_transcript(
        "docker exec db1 ls /var/lib/mysql | wc -l",
        ["[sudo] Password:", "\n7\n"],
    );
    let orchestrator = DockerOrchestrator::new(gateway);
    let request = ContainerCommandRequest::new(target, "ls /var/lib/mysql | wc -l");

    let response = orchestrator
        .run_in_container(&ExpansionContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.commands.len(), 1);
    assert_eq!(response.stdout(), "\n7\n");
    assert_eq!(
        orchestrator.gateway().calls()[0].credential_keys,
        vec!["**sudo**".to_string()]
    );
}

#[tokio::test]
#[tag(replay)]
async fn test_exec_keeps_single_segment() {
    let gateway = ReplayGateway::new().with_response("docker exec -d db1 echo Password:", "Password:\n");
    let orchestrator = DockerOrchestrator::new(gateway);
    let mut request = ContainerCommandRequest::new(db1(), "echo Password:");
    request.run_in_background = true;

    let response = orchestrator
        .run_in_container(&ExpansionContext::new(), &request)
        .await
        .unwrap();

    assert_eq!(response.commands.len(), 1);
    assert_eq!(response.stdout(), "Password:\n");
}

#[tokio::test]
#[tag(replay)]
async fn test_missing_binary_is_cli_error() {
    let gateway = ReplayGateway::new().with_response("docker images", "sh: 1: docker: command not found\n");
    let orchestrator = DockerOrchestrator::new(gateway);

    let error = orchestrator
        .images(&ExpansionContext::new(), &ImagesRequest::new(local()))
        .await
        .unwrap_err();

    assert!(matches!(error, DockerError::Cli(_)));
    assert!(error.to_string().contains("command not found"));
}
