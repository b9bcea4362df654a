/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use serde::Serialize;
use thiserror::Error;

/// Every diagnostic the pipeline can produce. The `#[error]` attribute is the
/// message template; severity is a property of the kind, not of the call site.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    #[error("Variable name cannot start with digits")]
    IllegalVariableName,

    #[error("Unknown token: '{token}'")]
    UnknownToken { token: String },

    #[error("Indentation mismatch, must be {required} spaces, but got {got}")]
    MismatchingIndent { required: usize, got: usize },

    #[error("If-statement set up incorrectly: {reason}")]
    IllegalIfConstruct { reason: String },

    #[error("Variable declaration set up incorrectly: {reason}")]
    IllegalDeclaration { reason: String },

    #[error("Missing '{missing}' for the {stmt_type} statement")]
    MissingToken { missing: String, stmt_type: String },

    #[error("Some parentheses are not closed")]
    MismatchParensLess,

    #[error("Closing non-existing parentheses")]
    MismatchParensMore,

    #[error("Expected {expected} here, but got {got}")]
    MismatchToken { expected: String, got: String },

    #[error("Missing scope declarations for the {stmt_type} statement")]
    EmptyScope { stmt_type: String },

    #[error("Variable {name} used before assignment")]
    UnknownVariable { name: String },

    #[error("Cannot mix positional and keyword arguments, first positional, then keyword")]
    CallableArgumentError,

    #[error("{missing} does not exist")]
    DoesNotExist { missing: String },

    #[error("Unknown call parameter by the name {name} was supplied to the {callee}")]
    UnknownCallParameter { name: String, callee: String },

    #[error("'{statement}' used outside of a loop")]
    LoopControlOutsideLoop { statement: String },

    // reserved for lint-grade diagnostics, exercised by tests
    #[error("This is a test warning")]
    TestWarning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::TestWarning => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A single registered message, carrying a copy of the offending source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub code_line: String,
}

impl DiagnosticMessage {
    pub fn render(&self) -> String {
        let header = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        format!(
            "{}:\n\n    {}\n\n{} (line {}, column {})",
            header, self.code_line, self.message, self.line, self.column
        )
    }
}

/// Shared accumulator for the lexing, parsing and IR stages. Constructed with
/// the full source text so it can slice line context for each message. The
/// blocking flag is sticky: one error gates code generation for good.
#[derive(Debug, Default)]
pub struct DiagnosticRegistry {
    code: String,
    messages: Vec<DiagnosticMessage>,
    is_blocking: bool,
}

impl DiagnosticRegistry {
    pub fn new(code: &str) -> Self {
        DiagnosticRegistry {
            code: code.to_string(),
            messages: Vec::new(),
            is_blocking: false,
        }
    }

    pub fn register(&mut self, line: usize, column: usize, kind: DiagnosticKind) {
        let code_line = self
            .code
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or("")
            .to_string();
        let severity = kind.severity();
        if severity == Severity::Error {
            self.is_blocking = true;
        }
        self.messages.push(DiagnosticMessage {
            severity,
            line,
            column,
            message: kind.to_string(),
            code_line,
        });
    }

    pub fn is_blocking(&self) -> bool {
        self.is_blocking
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn as_structured(&self) -> &[DiagnosticMessage] {
        &self.messages
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.messages)
    }

    pub fn display(&self) -> String {
        let mut result = if self.is_blocking {
            String::from("Compilation stopped due to several messages:\n")
        } else {
            String::from("Compilation produced several messages:\n")
        };
        for message in &self.messages {
            result.push_str(&message.render());
            result.push_str("\n\n");
        }
        result
    }
}
