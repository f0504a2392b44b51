/// Container Executor - self-hosted backend using Bollard
///
/// **Container rules:**
/// 1. One fresh container per request from the language's image
/// 2. Network disabled, memory and CPU limits enforced
/// 3. Source and stdin passed base64-encoded via `SOURCE_CODE` / `TEST_INPUT`
/// 4. `/runner.sh` compiles when needed and runs; it exits 100 when
///    compilation fails
/// 5. Hard timeout kills the container
/// 6. Container removed by a drop guard, even on cancellation
///
/// Exit codes: 0 success, 100 compilation error, 137 killed (memory),
/// anything else a runtime error.
use crate::executor::CodeExecutor;
use crate::typescript::handle_typescript_execution;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use codelab_common::config::DockerConfig;
use codelab_common::types::{ExecutionRequest, ExecutionResult, ExecutionStatus};
use codelab_common::{Language, LanguageConfig, LanguageRegistry, SandboxError};
use futures_util::stream::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const COMPILE_ERROR_EXIT_CODE: i64 = 100;
pub const OOM_EXIT_CODE: i64 = 137;
const DEFAULT_IMAGE_PREFIX: &str = "codelab";

/// Reject pathological inputs before they reach Docker.
pub fn check_input_sizes(config: &DockerConfig, source: &str, stdin: &str) -> Result<()> {
    if source.len() > config.max_source_bytes {
        bail!("Source code exceeds maximum size of {} bytes", config.max_source_bytes);
    }
    if stdin.len() > config.max_input_bytes {
        bail!("Input exceeds maximum size of {} bytes", config.max_input_bytes);
    }
    Ok(())
}

pub fn classify_exit(exit_code: Option<i64>) -> ExecutionStatus {
    match exit_code {
        Some(0) => ExecutionStatus::Success,
        Some(COMPILE_ERROR_EXIT_CODE) => ExecutionStatus::CompilationError,
        Some(OOM_EXIT_CODE) => ExecutionStatus::MemoryLimitExceeded,
        Some(_) => ExecutionStatus::RuntimeError,
        None => ExecutionStatus::InternalError,
    }
}

/// Guarantees container removal on drop
struct ContainerGuard<'a> {
    docker: &'a Docker,
    container_id: String,
}

impl<'a> ContainerGuard<'a> {
    fn new(docker: &'a Docker, container_id: String) -> Self {
        Self { docker, container_id }
    }
}

impl<'a> Drop for ContainerGuard<'a> {
    fn drop(&mut self) {
        // Drop can't await; hand removal to the runtime
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&container_id, Some(options)).await {
                warn!(container = %container_id, error = %e, "Failed to remove container");
            }
        });
    }
}

/// What one container run produced.
struct ContainerRun {
    stdout: String,
    stderr: String,
    exit_code: Option<i64>,
    timed_out: bool,
    elapsed_ms: u64,
}

pub struct DockerExecutor {
    docker: Docker,
    config: DockerConfig,
    registry: Arc<LanguageRegistry>,
}

impl DockerExecutor {
    pub fn connect(config: DockerConfig, registry: Arc<LanguageRegistry>) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::Backend(format!("Failed to connect to Docker daemon: {}", e)))?;
        info!(image_prefix = %config.image_prefix, "Docker executor ready");
        Ok(Self {
            docker,
            config,
            registry,
        })
    }

    /// Registry image, unless a custom image prefix was configured.
    fn image_for(&self, language: &LanguageConfig) -> String {
        if self.config.image_prefix == DEFAULT_IMAGE_PREFIX {
            language.image.clone()
        } else {
            format!("{}-{}:latest", self.config.image_prefix, language.name)
        }
    }

    /// Pull the image when it is not cached locally.
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image, "Image cache hit");
            return Ok(());
        }

        warn!(image, "Image cache miss, pulling");
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.context("Failed to pull Docker image")?;
        }

        info!(image, "Image pulled");
        Ok(())
    }

    async fn run_container(
        &self,
        image: &str,
        language: Language,
        source: &str,
        stdin: &str,
        time_limit: Duration,
        memory_limit_mb: u32,
    ) -> Result<ContainerRun> {
        check_input_sizes(&self.config, source, stdin)?;
        self.ensure_image(image)
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", image))?;

        let env = vec![
            format!("SOURCE_CODE={}", general_purpose::STANDARD.encode(source)),
            format!("TEST_INPUT={}", general_purpose::STANDARD.encode(stdin)),
            format!("LANGUAGE={}", language),
        ];

        let config = Config {
            image: Some(image.to_string()),
            cmd: Some(vec!["/bin/sh".to_string(), "/runner.sh".to_string()]),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(i64::from(memory_limit_mb) * 1024 * 1024),
                nano_cpus: Some((self.config.cpu_limit * 1_000_000_000.0) as i64),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container_name = format!("codelab-{}", uuid::Uuid::new_v4());
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };
        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .context("Failed to create Docker container")?;

        let container_id = container.id.clone();
        let _guard = ContainerGuard::new(&self.docker, container_id.clone());

        let started = Instant::now();
        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start Docker container")?;

        let collect = async {
            let mut stdout = String::new();
            let mut stderr = String::new();

            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });
            let mut logs = self.docker.logs(&container_id, logs_options);
            while let Some(output) = logs.next().await {
                match output {
                    Ok(LogOutput::StdOut { message }) => stdout.push_str(&String::from_utf8_lossy(&message)),
                    Ok(LogOutput::StdErr { message }) => stderr.push_str(&String::from_utf8_lossy(&message)),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Error reading container logs");
                        break;
                    }
                }
            }

            let wait_options = Some(WaitContainerOptions {
                condition: "not-running",
            });
            let mut wait = self.docker.wait_container(&container_id, wait_options);
            let exit_code = match wait.next().await {
                Some(Ok(response)) => Some(response.status_code),
                // bollard reports non-zero exits as an error carrying the code
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Some(code),
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to read container exit code");
                    None
                }
                None => None,
            };

            (stdout, stderr, exit_code)
        };

        match tokio::time::timeout(time_limit, collect).await {
            Ok((stdout, stderr, exit_code)) => Ok(ContainerRun {
                stdout,
                stderr,
                exit_code,
                timed_out: false,
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            Err(_) => {
                warn!(limit_ms = time_limit.as_millis() as u64, "Execution timed out, killing container");
                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(error = %e, "Failed to kill timed-out container");
                }
                Ok(ContainerRun {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                    timed_out: true,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

fn into_result(run: ContainerRun, time_limit: Duration) -> ExecutionResult {
    if run.timed_out {
        let message = format!("Execution timed out after {}ms", time_limit.as_millis());
        return ExecutionResult {
            stdout: run.stdout,
            stderr: message.clone(),
            exit_code: None,
            execution_time_ms: run.elapsed_ms,
            memory_kb: 0,
            status: ExecutionStatus::TimeLimitExceeded,
            error: Some(message),
        };
    }

    let status = classify_exit(run.exit_code);
    let mut stderr = run.stderr;
    if status == ExecutionStatus::MemoryLimitExceeded {
        stderr.push_str("\n[Container killed: likely exceeded memory limit]");
    }
    let error = match status {
        ExecutionStatus::Success => None,
        ExecutionStatus::InternalError => Some("No exit code captured from container".to_string()),
        other => Some(other.description().to_string()),
    };

    ExecutionResult {
        stdout: run.stdout,
        stderr,
        exit_code: run.exit_code.map(|c| c as i32),
        execution_time_ms: run.elapsed_ms,
        memory_kb: 0,
        status,
        error,
    }
}

#[async_trait]
impl CodeExecutor for DockerExecutor {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn registry(&self) -> Arc<LanguageRegistry> {
        Arc::clone(&self.registry)
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language, code_bytes = request.code.len()))]
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        request.check_limits()?;
        let requested = self.registry.resolve(&request.language)?;
        let degraded = handle_typescript_execution(&request.code, requested.name);
        let effective = if degraded.language == requested.name {
            requested
        } else {
            self.registry.resolve(degraded.language.as_str())?
        };

        let secs = request.time_limit.unwrap_or(requested.default_time_limit);
        let time_limit = Duration::try_from_secs_f64(secs)
            .map_err(|e| SandboxError::InvalidLimit(format!("time limit {}s: {}", secs, e)))?;
        let memory_limit_mb = request.memory_limit.unwrap_or(requested.default_memory_limit);
        let image = self.image_for(effective);
        let stdin = request.stdin.as_deref().unwrap_or_default();

        let run = self
            .run_container(&image, effective.name, &degraded.code, stdin, time_limit, memory_limit_mb)
            .await;

        Ok(match run {
            Ok(run) => {
                let result = into_result(run, time_limit);
                debug!(status = ?result.status, time_ms = result.execution_time_ms, "Container finished");
                result
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Container execution failed");
                ExecutionResult::internal_error(format!("{:#}", e))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(exit_code: Option<i64>) -> ContainerRun {
        ContainerRun {
            stdout: "out".to_string(),
            stderr: String::new(),
            exit_code,
            timed_out: false,
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(classify_exit(Some(0)), ExecutionStatus::Success);
        assert_eq!(classify_exit(Some(100)), ExecutionStatus::CompilationError);
        assert_eq!(classify_exit(Some(137)), ExecutionStatus::MemoryLimitExceeded);
        assert_eq!(classify_exit(Some(1)), ExecutionStatus::RuntimeError);
        assert_eq!(classify_exit(Some(139)), ExecutionStatus::RuntimeError);
        assert_eq!(classify_exit(None), ExecutionStatus::InternalError);
    }

    #[test]
    fn test_input_guardrails() {
        let config = DockerConfig {
            max_source_bytes: 8,
            max_input_bytes: 4,
            ..Default::default()
        };
        assert!(check_input_sizes(&config, "print()", "1").is_ok());
        assert!(check_input_sizes(&config, "print(1234)", "1").is_err());
        assert!(check_input_sizes(&config, "x", "12345").is_err());
    }

    #[test]
    fn test_result_conversion() {
        let ok = into_result(run(Some(0)), Duration::from_secs(1));
        assert_eq!(ok.status, ExecutionStatus::Success);
        assert_eq!(ok.stdout, "out");
        assert_eq!(ok.exit_code, Some(0));
        assert_eq!(ok.error, None);

        let oom = into_result(run(Some(137)), Duration::from_secs(1));
        assert_eq!(oom.status, ExecutionStatus::MemoryLimitExceeded);
        assert!(oom.stderr.contains("memory limit"));

        let mut slow = run(None);
        slow.timed_out = true;
        let tle = into_result(slow, Duration::from_millis(1500));
        assert_eq!(tle.status, ExecutionStatus::TimeLimitExceeded);
        assert!(tle.stderr.contains("1500ms"));
    }

    #[tokio::test]
    #[ignore] // requires a Docker daemon and the codelab-python image
    async fn test_python_in_container() {
        let executor = DockerExecutor::connect(DockerConfig::default(), Arc::new(LanguageRegistry::builtin())).unwrap();
        let request = ExecutionRequest::new("print(int(input()) * 2)", "python").with_stdin("21");

        let result = executor.execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.stdout.trim(), "42");
    }

    #[tokio::test]
    #[ignore] // requires a Docker daemon and the codelab-python image
    async fn test_infinite_loop_is_killed() {
        let executor = DockerExecutor::connect(DockerConfig::default(), Arc::new(LanguageRegistry::builtin())).unwrap();
        let request = ExecutionRequest::new("while True:\n    pass\n", "python").with_limits(Some(1.0), None);

        let result = executor.execute(&request).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::TimeLimitExceeded);
    }
}
