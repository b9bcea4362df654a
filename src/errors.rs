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

use thiserror::Error;

/// Internal pipeline failures. These are distinct from user diagnostics: a
/// diagnostic describes a problem in the compiled program, a `CompilerError`
/// describes a state the pipeline itself must never reach on valid input
/// (or a hard resource limit of the trivial register scheme).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompilerError {
    #[error("Expression requires more than {limit} live pseudo-registers")]
    RegisterOverflow { limit: u8 },

    #[error("Pseudo-register r{order} has no successor")]
    NoSuccessorRegister { order: u8 },

    #[error("Jump references label \"{name}\" that was never placed")]
    UnplacedLabel { name: String },

    #[error("No stack region allocated for variable \"{name}\"")]
    UnknownRegion { name: String },

    #[error("Malformed command: {reason}")]
    MalformedCommand { reason: String },
}
