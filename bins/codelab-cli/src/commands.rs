// CLI commands over the sandbox entrypoints
use anyhow::{Context as _, Result};
use codelab_common::config::{ExecutorBackend, SandboxConfig};
use codelab_common::types::{CodeExercise, ExecutionResult, RunRequest};
use codelab_common::LanguageRegistry;
use codelab_sandbox::{detect_language, CodeRunner, CodeValidator, ExecutorFactory, ValidatorOptions};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Settings shared by every command.
pub struct Context {
    config: SandboxConfig,
    registry: Arc<LanguageRegistry>,
    json: bool,
}

impl Context {
    pub fn load(backend: Option<ExecutorBackend>, languages: Option<&Path>, json: bool) -> Result<Self> {
        let mut config = SandboxConfig::from_env().context("Invalid sandbox configuration")?;
        if let Some(backend) = backend {
            config.backend = backend;
        }

        let registry = match languages {
            Some(path) => LanguageRegistry::load(path)
                .with_context(|| format!("Failed to load language registry from {}", path.display()))?,
            None => LanguageRegistry::builtin(),
        };

        Ok(Self {
            config,
            registry: Arc::new(registry),
            json,
        })
    }

    /// Executors are only built by the commands that execute code.
    fn factory(&self) -> Result<Arc<ExecutorFactory>> {
        let factory = ExecutorFactory::from_config(&self.config, Arc::clone(&self.registry))
            .with_context(|| format!("Failed to initialize {} executor", self.config.backend))?;
        Ok(Arc::new(factory))
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

pub fn detect(ctx: &Context, file: &Path) -> Result<()> {
    let code = read_source(file)?;
    let detection = detect_language(&code);

    if ctx.json {
        return print_json(&detection);
    }

    println!("Language:   {}", detection.language);
    println!("Confidence: {:.2}", detection.confidence);
    if !detection.reasons.is_empty() {
        println!("Reasons:");
        for reason in &detection.reasons {
            println!("  - {}", reason);
        }
    }
    if !detection.alternatives.is_empty() {
        println!("Alternatives:");
        for alt in &detection.alternatives {
            println!("  - {} ({:.2})", alt.language, alt.confidence);
        }
    }
    Ok(())
}

pub async fn run(
    ctx: &Context,
    file: &Path,
    language: Option<String>,
    input: Option<String>,
    input_file: Option<&Path>,
    time_limit: Option<f64>,
    memory_limit: Option<u32>,
) -> Result<()> {
    let code = read_source(file)?;
    let input = match input_file {
        Some(path) => Some(read_source(path)?),
        None => input,
    };

    let runner = CodeRunner::new(ctx.factory()?);
    let result = runner
        .run(RunRequest {
            code,
            language,
            input,
            time_limit,
            memory_limit,
            user_id: None,
        })
        .await?;

    if ctx.json {
        return print_json(&result);
    }
    print_result(&result);
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr.trim_end());
    }
    println!("---");
    println!("Status: {}", result.status.description());
    println!("Time:   {}ms", result.execution_time_ms);
    println!("Memory: {}KB", result.memory_kb);
    if let Some(code) = result.exit_code {
        println!("Exit:   {}", code);
    }
}

/// Returns whether every test case passed.
pub async fn validate(ctx: &Context, file: &Path, exercise_path: &Path, concurrency: usize) -> Result<bool> {
    let code = read_source(file)?;
    let exercise: CodeExercise = serde_json::from_str(&read_source(exercise_path)?)
        .with_context(|| format!("Failed to parse exercise {}", exercise_path.display()))?;
    info!(exercise = %exercise.id, tests = exercise.test_cases.len(), "Loaded exercise");

    let options = ValidatorOptions {
        max_concurrency: concurrency,
        ..Default::default()
    };
    let validator = CodeValidator::with_options(ctx.factory()?, options);
    let result = validator.validate_code(&code, &exercise, None).await;

    if ctx.json {
        print_json(&result)?;
    } else {
        println!("{}", result.feedback);
        println!();
        println!("Score: {}/{}", result.score, result.total_points);
    }

    Ok(result.is_correct)
}

pub fn languages(ctx: &Context) -> Result<()> {
    let configs = ctx.registry.configs();
    if ctx.json {
        return print_json(&configs);
    }

    println!(
        "{:<12} {:<30} {:>8} {:>8} {:>8}  ALIASES",
        "NAME", "DISPLAY NAME", "JUDGE ID", "TIME(s)", "MEM(MB)"
    );
    for config in configs {
        println!(
            "{:<12} {:<30} {:>8} {:>8} {:>8}  {}",
            config.name.as_str(),
            config.display_name,
            config.judge_id,
            config.default_time_limit,
            config.default_memory_limit,
            config.name.aliases().join(", ")
        );
    }
    Ok(())
}
