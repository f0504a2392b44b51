/// Execution Backends - capability interface and factory
///
/// **Core Responsibility:**
/// Run one `ExecutionRequest` and hand back an `ExecutionResult`.
///
/// **Boundary:**
/// - Executors know HOW to run code (hosted judge, local containers)
/// - Executors do NOT score output; that is the validator's job
/// - An unsupported language is the only `Err`; every transport or
///   provider failure comes back as an `internal_error` result
///
/// The factory holds the one active executor for the process and lets it be
/// swapped without touching the validator or the runner.
use crate::docker::DockerExecutor;
use crate::judge0::Judge0Executor;
use async_trait::async_trait;
use codelab_common::config::{ExecutorBackend, SandboxConfig};
use codelab_common::types::{ExecutionRequest, ExecutionResult};
use codelab_common::{LanguageConfig, LanguageRegistry, SandboxError};
use std::sync::{Arc, RwLock};
use tracing::info;

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Short backend name, e.g. `judge0`
    fn name(&self) -> &'static str;

    fn registry(&self) -> Arc<LanguageRegistry>;

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError>;

    fn supported_languages(&self) -> Vec<LanguageConfig> {
        self.registry().configs()
    }

    fn is_language_supported(&self, language: &str) -> bool {
        self.registry().is_supported(language)
    }
}

/// Build the executor for `backend`.
pub fn build_executor(
    backend: ExecutorBackend,
    config: &SandboxConfig,
    registry: Arc<LanguageRegistry>,
) -> Result<Arc<dyn CodeExecutor>, SandboxError> {
    let executor: Arc<dyn CodeExecutor> = match backend {
        ExecutorBackend::Judge0 => Arc::new(Judge0Executor::from_config(&config.judge0, registry)?),
        ExecutorBackend::Docker => Arc::new(DockerExecutor::connect(config.docker.clone(), registry)?),
    };
    Ok(executor)
}

/// Holds the active executor. Shared as `Arc<ExecutorFactory>`.
pub struct ExecutorFactory {
    active: RwLock<Arc<dyn CodeExecutor>>,
}

impl ExecutorFactory {
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        Self {
            active: RwLock::new(executor),
        }
    }

    pub fn from_config(config: &SandboxConfig, registry: Arc<LanguageRegistry>) -> Result<Self, SandboxError> {
        let executor = build_executor(config.backend, config, registry)?;
        info!(backend = executor.name(), "Executor factory initialized");
        Ok(Self::new(executor))
    }

    /// Snapshot of the active executor. In-flight work keeps the executor
    /// it started with even if the factory is switched meanwhile.
    pub fn current(&self) -> Arc<dyn CodeExecutor> {
        let guard = self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the active executor; returns the previous one.
    pub fn swap(&self, executor: Arc<dyn CodeExecutor>) -> Arc<dyn CodeExecutor> {
        let mut guard = self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        info!(from = guard.name(), to = executor.name(), "Switching executor");
        std::mem::replace(&mut *guard, executor)
    }

    /// Build a fresh executor for `backend`, keeping the current registry.
    pub fn switch_backend(&self, backend: ExecutorBackend, config: &SandboxConfig) -> Result<(), SandboxError> {
        let registry = self.current().registry();
        let executor = build_executor(backend, config, registry)?;
        self.swap(executor);
        Ok(())
    }

    pub fn backend_name(&self) -> &'static str {
        self.current().name()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use codelab_common::types::ExecutionStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the scripted executor does for a given stdin.
    #[derive(Clone)]
    pub enum Scripted {
        Output(&'static str),
        Status(ExecutionStatus, &'static str),
        Fail(SandboxError),
        Delayed(Duration, &'static str),
    }

    /// In-memory executor keyed by stdin; unknown inputs echo nothing.
    pub struct ScriptedExecutor {
        pub name: &'static str,
        pub script: HashMap<String, Scripted>,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<ExecutionRequest>>,
        registry: Arc<LanguageRegistry>,
    }

    impl ScriptedExecutor {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                script: HashMap::new(),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                registry: Arc::new(LanguageRegistry::builtin()),
            }
        }

        pub fn on(mut self, stdin: &str, outcome: Scripted) -> Self {
            self.script.insert(stdin.to_string(), outcome);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn result(status: ExecutionStatus, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(if status == ExecutionStatus::Success { 0 } else { 1 }),
            execution_time_ms: 5,
            memory_kb: 1024,
            status,
            error: (status != ExecutionStatus::Success).then(|| stderr.to_string()),
        }
    }

    #[async_trait]
    impl CodeExecutor for ScriptedExecutor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn registry(&self) -> Arc<LanguageRegistry> {
            Arc::clone(&self.registry)
        }

        async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.registry.resolve(&request.language)?;

            let stdin = request.stdin.clone().unwrap_or_default();
            match self.script.get(&stdin).cloned() {
                Some(Scripted::Output(out)) => Ok(result(ExecutionStatus::Success, out, "")),
                Some(Scripted::Status(status, stderr)) => Ok(result(status, "", stderr)),
                Some(Scripted::Fail(err)) => Err(err),
                Some(Scripted::Delayed(delay, out)) => {
                    tokio::time::sleep(delay).await;
                    Ok(result(ExecutionStatus::Success, out, ""))
                }
                None => Ok(result(ExecutionStatus::Success, "", "")),
            }
        }
    }
}
