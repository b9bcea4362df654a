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

pub mod codegen;
pub mod diagnostics;
pub mod errors;
pub mod ir;
pub mod lexer;
pub mod parser;

use codegen::CodeGen;
use diagnostics::DiagnosticRegistry;
use errors::CompilerError;
use ir::IrBuilder;
use parser::Parser;

/// What one compilation produced: the output text when the pipeline ran to
/// completion, plus every diagnostic gathered along the way. A blocking
/// diagnostic leaves `output` empty.
pub struct CompileOutcome {
    pub output: Option<String>,
    pub registry: DiagnosticRegistry,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        self.output.is_some()
    }
}

/// Wires the four stages together: source text in, NASM text (or the
/// diagnostic bundle) out. Code generation is skipped whenever a blocking
/// diagnostic was registered by the earlier stages.
pub struct Compiler {
    debug: bool,
}

impl Compiler {
    pub fn new(debug: bool) -> Self {
        Compiler { debug }
    }

    pub fn compile(&self, source: &str) -> Result<CompileOutcome, CompilerError> {
        let mut registry = DiagnosticRegistry::new(source);
        let tokens = lexer::tokenize(source, &mut registry);
        let ast = Parser::new(tokens, &mut registry).parse();
        let representation = IrBuilder::new(&mut registry).build(&ast)?;
        if registry.is_blocking() {
            return Ok(CompileOutcome {
                output: None,
                registry,
            });
        }
        let assembly = CodeGen::new(self.debug).generate(&representation)?;
        Ok(CompileOutcome {
            output: Some(assembly),
            registry,
        })
    }

    /// Runs the front half of the pipeline only and renders the
    /// intermediate representation instead of assembly.
    pub fn compile_to_ir(&self, source: &str) -> Result<CompileOutcome, CompilerError> {
        let mut registry = DiagnosticRegistry::new(source);
        let tokens = lexer::tokenize(source, &mut registry);
        let ast = Parser::new(tokens, &mut registry).parse();
        let representation = IrBuilder::new(&mut registry).build(&ast)?;
        if registry.is_blocking() {
            return Ok(CompileOutcome {
                output: None,
                registry,
            });
        }
        let listing = format!(
            "{}\n{}",
            representation.pprint(),
            representation.pprint_vars()
        );
        Ok(CompileOutcome {
            output: Some(listing),
            registry,
        })
    }
}
