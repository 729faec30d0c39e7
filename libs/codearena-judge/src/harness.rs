/// Harness Generator - per-language test invocation snippets
///
/// **Core Responsibility:**
/// Turn a problem's hidden test cases into source text that calls the
/// user's entry point once per test case and prints each result on its own
/// line, in test-case order.
///
/// **Why line-per-test matters:**
/// The judge only reports one flat stdout stream. Line `i` of that stream is
/// matched against test case `i` by the evaluator, so a harness must never
/// print anything else.
///
/// **Literal encoding:**
/// Test inputs are JSON values. Each language renders them through its own
/// literal encoder with proper escaping; raw input text is never spliced
/// into the program.
///
/// New languages are added by registering a generator, not by branching here.

use codearena_common::types::{Language, TestCase};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),
    #[error("function name '{0}' is not a valid identifier")]
    InvalidFunctionName(String),
    #[error("test case {index} has an input that cannot be written as a {language} literal")]
    UnencodableInput { index: usize, language: Language },
}

/// Pure generator: (function name, test cases) -> harness source.
pub type HarnessFn = fn(&str, &[TestCase]) -> Result<String, HarnessError>;

/// Mapping from language to its harness generator.
#[derive(Clone)]
pub struct HarnessRegistry {
    generators: HashMap<Language, HarnessFn>,
}

impl Default for HarnessRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Language::Python, python_harness);
        registry.register(Language::JavaScript, javascript_harness);
        registry.register(Language::Cpp, cpp_harness);
        registry
    }
}

impl HarnessRegistry {
    pub fn empty() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }

    pub fn register(&mut self, language: Language, generator: HarnessFn) {
        self.generators.insert(language, generator);
    }

    /// Resolve a language name to a registered language.
    pub fn resolve(&self, language_name: &str) -> Result<Language, HarnessError> {
        Language::from_name(language_name)
            .filter(|lang| self.generators.contains_key(lang))
            .ok_or_else(|| HarnessError::UnsupportedLanguage(language_name.to_string()))
    }

    /// Build the harness for a language name as sent by the client.
    pub fn build_harness(
        &self,
        language_name: &str,
        function_name: &str,
        test_cases: &[TestCase],
    ) -> Result<String, HarnessError> {
        let language = self.resolve(language_name)?;
        self.build(language, function_name, test_cases)
    }

    pub fn build(
        &self,
        language: Language,
        function_name: &str,
        test_cases: &[TestCase],
    ) -> Result<String, HarnessError> {
        let generator = self
            .generators
            .get(&language)
            .ok_or_else(|| HarnessError::UnsupportedLanguage(language.to_string()))?;

        if !is_identifier(function_name) {
            return Err(HarnessError::InvalidFunctionName(function_name.to_string()));
        }

        generator(function_name, test_cases)
    }
}

/// User code first, harness second.
pub fn assemble(user_code: &str, harness: &str) -> String {
    let mut program = String::with_capacity(user_code.len() + harness.len() + 2);
    program.push_str(user_code);
    if !user_code.ends_with('\n') {
        program.push('\n');
    }
    program.push('\n');
    program.push_str(harness);
    program
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn encode_args(
    test_case: &TestCase,
    index: usize,
    language: Language,
    encode: fn(&Value) -> Option<String>,
) -> Result<String, HarnessError> {
    test_case
        .input
        .iter()
        .map(|value| encode(value).ok_or(HarnessError::UnencodableInput { index, language }))
        .collect::<Result<Vec<_>, _>>()
        .map(|args| args.join(", "))
}

// ---------------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------------

pub fn python_harness(function_name: &str, test_cases: &[TestCase]) -> Result<String, HarnessError> {
    let mut out = String::new();
    for (index, test_case) in test_cases.iter().enumerate() {
        let args = encode_args(test_case, index, Language::Python, python_literal)?;
        out.push_str(&format!("print({}({}))\n", function_name, args));
    }
    Ok(out)
}

fn python_literal(value: &Value) -> Option<String> {
    Some(match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        // JSON string escapes are a subset of Python's.
        Value::String(s) => serde_json::to_string(s).ok()?,
        Value::Array(items) => format!(
            "[{}]",
            items
                .iter()
                .map(python_literal)
                .collect::<Option<Vec<_>>>()?
                .join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| Some(format!("{}: {}", serde_json::to_string(k).ok()?, python_literal(v)?)))
                .collect::<Option<Vec<_>>>()?
                .join(", ")
        ),
    })
}

// ---------------------------------------------------------------------------
// JavaScript
// ---------------------------------------------------------------------------

pub fn javascript_harness(
    function_name: &str,
    test_cases: &[TestCase],
) -> Result<String, HarnessError> {
    let mut out = String::new();
    for (index, test_case) in test_cases.iter().enumerate() {
        let args = encode_args(test_case, index, Language::JavaScript, javascript_literal)?;
        out.push_str(&format!("console.log({}({}));\n", function_name, args));
    }
    Ok(out)
}

/// JSON text is a valid JavaScript expression.
fn javascript_literal(value: &Value) -> Option<String> {
    serde_json::to_string(value).ok()
}

// ---------------------------------------------------------------------------
// C++
// ---------------------------------------------------------------------------

const CPP_PRELUDE: &str = r#"#include <iostream>
#include <string>
#include <vector>

template <typename T>
void codearena_print(const T& value) { std::cout << value; }
inline void codearena_print(bool value) { std::cout << (value ? "true" : "false"); }
inline void codearena_print(const std::string& value) { std::cout << value; }
template <typename T>
void codearena_print(const std::vector<T>& values) {
    std::cout << '[';
    for (std::size_t i = 0; i < values.size(); ++i) {
        if (i > 0) std::cout << ", ";
        codearena_print(values[i]);
    }
    std::cout << ']';
}

int main() {
"#;

pub fn cpp_harness(function_name: &str, test_cases: &[TestCase]) -> Result<String, HarnessError> {
    let mut out = String::from(CPP_PRELUDE);
    for (index, test_case) in test_cases.iter().enumerate() {
        let args = encode_args(test_case, index, Language::Cpp, cpp_literal)?;
        out.push_str(&format!(
            "    codearena_print({}({}));\n    std::cout << '\\n';\n",
            function_name, args
        ));
    }
    out.push_str("    return 0;\n}\n");
    Ok(out)
}

fn cpp_literal(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    Some(i.to_string())
                } else {
                    Some(format!("{}LL", i))
                }
            } else if let Some(u) = n.as_u64() {
                Some(format!("{}ULL", u))
            } else {
                Some(n.to_string())
            }
        }
        Value::String(s) => Some(format!("std::string(\"{}\")", cpp_escape(s))),
        Value::Array(items) => Some(format!(
            "{{{}}}",
            items
                .iter()
                .map(cpp_literal)
                .collect::<Option<Vec<_>>>()?
                .join(", ")
        )),
    }
}

fn cpp_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // Octal escapes stop after three digits, unlike \x.
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03o}", c as u32))
            }
            c => out.push(c),
        }
    }
    out
}
