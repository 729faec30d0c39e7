use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Languages the harness generator knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Cpp,
}

impl Language {
    /// Parse a human language name, e.g. "Python 3", "js", "C++".
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        match normalized.as_str() {
            "python" | "python3" | "python 3" | "py" => Some(Language::Python),
            "javascript" | "js" | "node" | "nodejs" | "node.js" => Some(Language::JavaScript),
            "cpp" | "c++" | "c++17" | "cpp17" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Judge0 language id used when the caller does not pick one.
    pub fn default_judge_id(&self) -> u32 {
        match self {
            Language::Python => 71,
            Language::JavaScript => 93,
            Language::Cpp => 54,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Cpp => write!(f, "cpp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: Vec<serde_json::Value>,
    pub expected_output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedLanguage {
    pub name: String,
    pub language_id: u32,
}

/// A problem as the submission pipeline sees it. Owned by the problem store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub supported_languages: Vec<SupportedLanguage>,
}

/// Minimum number of hidden test cases a problem must carry (strictly more than this).
pub const MIN_TEST_CASES: usize = 2;

impl Problem {
    pub fn supported_language(&self, language_id: u32) -> Option<&SupportedLanguage> {
        self.supported_languages
            .iter()
            .find(|lang| lang.language_id == language_id)
    }

    /// Checks the invariants a problem must satisfy before it may be judged.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push(FieldError::new("id", "Problem id is required"));
        }
        if self.function_name.trim().is_empty() {
            errors.push(FieldError::new("functionName", "Function name is required"));
        }
        if self.test_cases.len() <= MIN_TEST_CASES {
            errors.push(FieldError::new(
                "testCases",
                "Problem should have more than 2 test cases",
            ));
        }
        if self.supported_languages.is_empty() {
            errors.push(FieldError::new(
                "supportedLanguages",
                "At least one supported language is required",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Submission body as it arrives on the wire. Every field is optional until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_language_id")]
    pub language_id: Option<u32>,
    #[serde(default, rename = "languageName")]
    pub language_name: Option<String>,
    #[serde(default, rename = "problemId")]
    pub problem_id: Option<String>,
}

/// A request whose required fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub code: String,
    pub language_id: u32,
    pub language_name: String,
    pub problem_id: String,
}

impl SubmissionRequest {
    pub fn validate(self) -> Result<ValidSubmission, Vec<FieldError>> {
        let mut errors = Vec::new();

        let code = self.code.filter(|c| !c.trim().is_empty());
        if code.is_none() {
            errors.push(FieldError::new("code", "Code is required"));
        }
        let language_id = self.language_id.filter(|id| *id != 0);
        if language_id.is_none() {
            errors.push(FieldError::new("language_id", "Language id is required"));
        }
        let language_name = self
            .language_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if language_name.is_none() {
            errors.push(FieldError::new("languageName", "Language name is required"));
        }
        let problem_id = self
            .problem_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if problem_id.is_none() {
            errors.push(FieldError::new("problemId", "Problem id is required"));
        }

        match (code, language_id, language_name, problem_id) {
            (Some(code), Some(language_id), Some(language_name), Some(problem_id)) => {
                Ok(ValidSubmission {
                    code,
                    language_id,
                    language_name,
                    problem_id,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Accepts `language_id` as a JSON number or a numeric string.
fn lenient_language_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid language_id '{}'", s))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub input: Vec<serde_json::Value>,
    pub expected: String,
    pub received: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictReport {
    pub test_results: Vec<TestResult>,
    pub all_passed: bool,
}

impl VerdictReport {
    pub fn new(test_results: Vec<TestResult>) -> Self {
        let all_passed = test_results.iter().all(|r| r.passed);
        Self {
            test_results,
            all_passed,
        }
    }

    pub fn summary(&self) -> &'static str {
        if self.all_passed {
            "All test cases passed!"
        } else {
            "Some test cases failed."
        }
    }
}

/// Outcome of judging one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    Evaluated(VerdictReport),
    #[serde(rename = "compilation_error")]
    CompilationFailure {
        #[serde(rename = "compileOutput")]
        compile_output: String,
    },
    #[serde(rename = "runtime_error")]
    RuntimeFailure { status: String, stderr: String },
}

impl Verdict {
    pub fn summary(&self) -> &'static str {
        match self {
            Verdict::Evaluated(report) => report.summary(),
            Verdict::CompilationFailure { .. } => "Compilation failed.",
            Verdict::RuntimeFailure { .. } => "Execution failed.",
        }
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Evaluated(report) if report.all_passed => "accepted",
            Verdict::Evaluated(_) => "wrong_answer",
            Verdict::CompilationFailure { .. } => "compilation_error",
            Verdict::RuntimeFailure { .. } => "runtime_error",
        }
    }
}

/// The latest code a user sent for a problem, kept by the submission store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    #[serde(rename = "language_id")]
    pub language_id: u32,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
