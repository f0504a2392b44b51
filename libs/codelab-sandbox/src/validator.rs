/// Code Validator - runs an exercise's test cases and scores them
///
/// **Scoring Rules:**
/// - Every test case runs, in order, regardless of earlier failures
/// - score = sum of points for passed test cases
/// - total_points = sum of all test case points
/// - is_correct only when every test case passed
///
/// **Normalization Rules:**
/// - Trim leading/trailing whitespace
/// - CRLF → LF
/// - Collapse internal whitespace runs to a single space
/// - Case sensitive, no numeric tolerance
///
/// A failing executor call is recorded on its own test case; it never
/// aborts the batch.
use crate::executor::ExecutorFactory;
use codelab_common::types::{
    CodeExercise, ExecutionRequest, ExecutionResult, ExecutionStatus, TestCase, TestCaseResult, ValidationResult,
};
use codelab_common::SandboxError;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_FEEDBACK_FAILURES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorOptions {
    /// Test cases in flight at once; 1 runs them serially
    pub max_concurrency: usize,
    /// Seconds
    pub default_time_limit: f64,
    /// Megabytes
    pub default_memory_limit: u32,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            default_time_limit: 5.0,
            default_memory_limit: 128,
        }
    }
}

/// Normalize program output for comparison.
pub fn normalize_output(output: &str) -> String {
    output
        .replace("\r\n", "\n")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

pub struct CodeValidator {
    factory: Arc<ExecutorFactory>,
    options: ValidatorOptions,
}

impl CodeValidator {
    pub fn new(factory: Arc<ExecutorFactory>) -> Self {
        Self::with_options(factory, ValidatorOptions::default())
    }

    pub fn with_options(factory: Arc<ExecutorFactory>, options: ValidatorOptions) -> Self {
        Self { factory, options }
    }

    #[tracing::instrument(skip(self, code, exercise), fields(exercise = %exercise.id, tests = exercise.test_cases.len()))]
    pub async fn validate_code(&self, code: &str, exercise: &CodeExercise, user_id: Option<&str>) -> ValidationResult {
        let executor = self.factory.current();
        let time_limit = exercise.time_limit.unwrap_or(self.options.default_time_limit);
        let memory_limit = exercise.memory_limit.unwrap_or(self.options.default_memory_limit);

        info!(
            user = user_id.unwrap_or("anonymous"),
            backend = executor.name(),
            code_bytes = code.len(),
            "Validating submission"
        );

        let outcomes: Vec<(TestCaseResult, bool)> = stream::iter(exercise.test_cases.iter())
            .map(|test_case| {
                let executor = Arc::clone(&executor);
                let request = ExecutionRequest {
                    code: code.to_string(),
                    language: exercise.language.clone(),
                    stdin: test_case.input.clone(),
                    time_limit: Some(time_limit),
                    memory_limit: Some(memory_limit),
                };
                async move {
                    let outcome = executor.execute(&request).await;
                    let raised = outcome.is_err();
                    (evaluate_test(test_case, outcome), raised)
                }
            })
            // `buffered` yields in input order even when later cases finish first
            .buffered(self.options.max_concurrency.max(1))
            .collect()
            .await;

        let raised_everywhere = !outcomes.is_empty() && outcomes.iter().all(|(_, raised)| *raised);
        let test_results = outcomes.into_iter().map(|(result, _)| result).collect();
        aggregate_results(exercise, test_results, raised_everywhere)
    }
}

/// Judge one test case from its execution outcome.
pub fn evaluate_test(
    test_case: &TestCase,
    outcome: Result<ExecutionResult, SandboxError>,
) -> TestCaseResult {
    match outcome {
        Ok(result) => {
            let passed = result.status == ExecutionStatus::Success
                && outputs_match(&result.stdout, &test_case.expected_output);
            let error = if result.status == ExecutionStatus::Success {
                None
            } else {
                let detail = if result.stderr.trim().is_empty() {
                    result.error.clone()
                } else {
                    Some(result.stderr.clone())
                };
                detail.or_else(|| Some(result.status.description().to_string()))
            };

            debug!(test = %test_case.id, status = ?result.status, passed, "Test case evaluated");
            TestCaseResult {
                test_case: test_case.clone(),
                passed,
                actual_output: result.stdout,
                execution_time_ms: result.execution_time_ms,
                status: result.status,
                error,
            }
        }
        Err(e) => {
            warn!(test = %test_case.id, error = %e, "Test case could not be executed");
            TestCaseResult {
                test_case: test_case.clone(),
                passed: false,
                actual_output: String::new(),
                execution_time_ms: 0,
                status: ExecutionStatus::InternalError,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Fold per-test results into a `ValidationResult`. `raised_everywhere`
/// means no test case reached the executor's program stage at all.
pub fn aggregate_results(
    exercise: &CodeExercise,
    test_results: Vec<TestCaseResult>,
    raised_everywhere: bool,
) -> ValidationResult {
    let total_points: u64 = exercise.test_cases.iter().map(|tc| u64::from(tc.points)).sum();
    if exercise.total_points != 0 && u64::from(exercise.total_points) != total_points {
        warn!(
            declared = exercise.total_points,
            computed = total_points,
            "Exercise total points differ from the sum of its test cases"
        );
    }

    let score: u64 = test_results
        .iter()
        .filter(|r| r.passed)
        .map(|r| u64::from(r.test_case.points))
        .sum();
    let passed_tests = test_results.iter().filter(|r| r.passed).count();
    let total_tests = test_results.len();
    let is_correct = passed_tests == total_tests;

    let execution_error = execution_error(&test_results, raised_everywhere);
    let feedback = build_feedback(&test_results, passed_tests, total_tests);

    info!(score, total_points, passed_tests, total_tests, is_correct, "Validation complete");

    ValidationResult {
        is_correct,
        score,
        total_points,
        passed_tests,
        total_tests,
        test_results,
        execution_error,
        feedback,
    }
}

/// Set when the submission could not run for any test case.
fn execution_error(results: &[TestCaseResult], raised_everywhere: bool) -> Option<String> {
    if results.is_empty() {
        return None;
    }
    let all_compile_errors = results.iter().all(|r| r.status == ExecutionStatus::CompilationError);

    if raised_everywhere || all_compile_errors {
        results.first().and_then(|r| r.error.clone())
    } else {
        None
    }
}

fn build_feedback(results: &[TestCaseResult], passed: usize, total: usize) -> String {
    if passed == total {
        return format!("🎉 All {} tests passed! Great job!", total);
    }

    let mut feedback = format!("{}/{} tests passed.", passed, total);
    let failures: Vec<&TestCaseResult> = results.iter().filter(|r| !r.passed).collect();

    for result in failures.iter().take(MAX_FEEDBACK_FAILURES) {
        let label = if result.test_case.description.is_empty() {
            result.test_case.id.as_str()
        } else {
            result.test_case.description.as_str()
        };
        feedback.push_str(&format!("\n\n❌ {}", label));
        feedback.push_str(&format!("\n   Expected: {}", result.test_case.expected_output.trim()));
        feedback.push_str(&format!("\n   Got: {}", result.actual_output.trim()));
        if let Some(error) = &result.error {
            feedback.push_str(&format!("\n   Error: {}", error.trim()));
        }
    }

    if failures.len() > MAX_FEEDBACK_FAILURES {
        feedback.push_str(&format!(
            "\n\n...and {} more failed",
            failures.len() - MAX_FEEDBACK_FAILURES
        ));
    }

    feedback
}
