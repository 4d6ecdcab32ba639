//! Docker integration tests - require a running Docker daemon and network
//! access to pull `alpine`.
//!
//! Run with: cargo test --test docker_integration -- --ignored

use core_ci::prelude::*;
use std::fs;

const IMAGE: &str = "alpine:3.20";

fn sample_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("core/tests/cmake")).unwrap();
    fs::write(dir.path().join("core/tests/cmake/marker.txt"), "core").unwrap();
    fs::create_dir_all(dir.path().join("deps/libz")).unwrap();
    fs::write(dir.path().join("deps/libz/zlib.h"), "zlib").unwrap();
    fs::write(dir.path().join("excluded.txt"), "nope").unwrap();
    dir
}

fn alpine_config() -> RunnerConfig {
    let mut config = RunnerConfig::new().with_image(IMAGE);
    config.keepalive_command = vec!["tail".to_string(), "-f".to_string(), "/dev/null".to_string()];
    config
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn docker_platform_has_architecture() {
    let config = alpine_config();
    let ctx = ExecutionContext::connect(&config, std::path::Path::new("."))
        .await
        .expect("Docker daemon not available");

    let platform = ctx.platform(&Container::from_image(IMAGE)).await.unwrap();
    assert!(platform.as_str().starts_with("linux/"));
    assert!(!platform.architecture().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn docker_exec_sees_filtered_tree_and_exit_codes() {
    let tree = sample_tree();
    let config = alpine_config().with_project_root(tree.path());
    let ctx = ExecutionContext::connect(&config, std::path::Path::new("."))
        .await
        .expect("Docker daemon not available");

    let container = Container::from_image(IMAGE)
        .with_env_variable("CUBZH_ARCH", "test-arch")
        .with_mounted_directory(
            "/project",
            ctx.host_directory(&["core".to_string(), "deps/libz".to_string()])
                .unwrap(),
        )
        .with_workdir("/project/core/tests/cmake");
    let id = ctx.start(&container).await.unwrap();

    let sh = |script: &str| vec!["sh".to_string(), "-c".to_string(), script.to_string()];

    let listed = ctx.exec(&id, &container, &sh("cat marker.txt; echo \" $CUBZH_ARCH\"")).await.unwrap();
    assert!(listed.is_success());
    assert_eq!(listed.stdout.trim(), "core test-arch");

    let excluded = ctx.exec(&id, &container, &sh("test -e /project/excluded.txt")).await.unwrap();
    assert_eq!(excluded.exit_code, 1);

    let failing = ctx.exec(&id, &container, &sh("echo partial; echo oops >&2; exit 3")).await.unwrap();
    assert_eq!(failing.exit_code, 3);
    assert_eq!(failing.stdout.trim(), "partial");
    assert_eq!(failing.stderr.trim(), "oops");

    assert!(ctx.close().await.is_empty());
    assert_eq!(ctx.live_containers(), 0);
}
