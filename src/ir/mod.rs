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

pub mod command;
pub mod label;
pub mod record;
pub mod register;
pub mod representation;
pub mod scope;
pub mod variable;

use std::collections::HashSet;

use crate::diagnostics::{DiagnosticKind, DiagnosticRegistry};
use crate::errors::CompilerError;
use crate::parser::node::{Node, NodeKind};
use command::{Command, CommandType, Operand, Target};
use label::LabelId;
use record::{FieldSource, FieldType, Record, RecordLiteral};
use register::{FIRST_FREE_REGISTER, PseudoRegister};
use representation::Representation;
use variable::{VarType, Variable};

/// Labels a `break`/`continue` inside the innermost enclosing loop jumps to.
#[derive(Clone, Copy)]
struct LoopContext {
    break_to: LabelId,
    continue_to: LabelId,
}

/// Walks the AST and emits a linear `Representation`: three-address
/// commands over pseudo-registers, scoped variables, labels and records.
pub struct IrBuilder<'r> {
    registry: &'r mut DiagnosticRegistry,
    rep: Representation,
    free_register: u8,
    used_label_names: HashSet<String>,
    scope_counter: usize,
}

impl<'r> IrBuilder<'r> {
    pub fn new(registry: &'r mut DiagnosticRegistry) -> Self {
        IrBuilder {
            registry,
            rep: Representation::new("main"),
            free_register: FIRST_FREE_REGISTER,
            used_label_names: HashSet::new(),
            scope_counter: 0,
        }
    }

    pub fn build(mut self, ast: &Node) -> Result<Representation, CompilerError> {
        for child in &ast.children {
            if child.kind == NodeKind::Scope {
                self.rep.add_scope("main");
                self.rep.append(Command::escalate());
                self.lower_scope(child, 0, None)?;
                self.rep.append(Command::deescalate());
                self.rep.close_current_scope();
            }
        }
        self.rep.compact_labels();
        Ok(self.rep)
    }

    fn lower_scope(
        &mut self,
        node: &Node,
        depth: usize,
        loop_ctx: Option<LoopContext>,
    ) -> Result<(), CompilerError> {
        for child in &node.children {
            match child.kind {
                NodeKind::Stmt => self.lower_stmt(child)?,
                NodeKind::If => self.lower_if(child, depth, loop_ctx)?,
                NodeKind::While => self.lower_while(child, depth)?,
                NodeKind::Class => self.lower_class(child),
                NodeKind::Break => self.lower_loop_jump(child, loop_ctx.map(|c| c.break_to), "break"),
                NodeKind::Continue => {
                    self.lower_loop_jump(child, loop_ctx.map(|c| c.continue_to), "continue")
                }
                // recovery placeholders and effect-free bare terms
                _ => {}
            }
        }
        Ok(())
    }

    // ---- statements ----

    fn lower_stmt(&mut self, node: &Node) -> Result<(), CompilerError> {
        let Some(term) = node.children.first() else {
            return Ok(());
        };
        if term.kind != NodeKind::Term || term.children.is_empty() {
            return Ok(());
        }
        let Some(target_name) = term.children[0].value.clone() else {
            return Ok(());
        };
        let annotation = term
            .children
            .get(1)
            .and_then(|t| t.children.first())
            .and_then(|n| n.value.clone());

        let Some(expr) = node.children.get(1) else {
            self.lower_bare_declaration(term, &target_name, annotation);
            return Ok(());
        };

        match expr.kind {
            NodeKind::BinExpr if Self::is_call(expr) => {
                self.lower_record_store(term, &target_name, annotation, expr)?;
            }
            NodeKind::BinExpr => {
                let command = self.lower_bin_expr(expr)?;
                let source = Self::target_operand(&command);
                let var_type = command.operation.result_type().unwrap_or(VarType::Int);
                self.rep.append(command);
                let variable = self.rep.register_var(&target_name, None, var_type);
                self.rep.append(Command::store(variable, source));
            }
            NodeKind::Term => {
                let source = self.term_operand(expr);
                let (value, var_type) = match &source {
                    Operand::Value(value) => (Some(value.clone()), VarType::Int),
                    Operand::Variable(variable) => (None, variable.var_type),
                    _ => (None, VarType::Int),
                };
                let variable = self.rep.register_var(&target_name, value, var_type);
                self.rep.append(Command::store(variable, source));
            }
            _ => {}
        }
        self.free_register = FIRST_FREE_REGISTER;
        Ok(())
    }

    // `x: Foo` with no initializer: scalars get zero-initialized, records
    // need a constructor call
    fn lower_bare_declaration(&mut self, term: &Node, name: &str, annotation: Option<String>) {
        if let Some(type_name) = &annotation {
            if self.rep.get_record_id(type_name).is_some() {
                let (line, column) = Self::node_position(term);
                self.registry.register(
                    line,
                    column,
                    DiagnosticKind::IllegalDeclaration {
                        reason: "record declarations require a constructor call".to_string(),
                    },
                );
                return;
            }
        }
        let variable = self
            .rep
            .register_var(name, Some("0".to_string()), VarType::Int);
        self.rep
            .append(Command::store(variable, Operand::Value("0".to_string())));
    }

    // ---- expressions ----

    /// Lowers a binary/unary expression tree. Sub-expressions append their
    /// commands to the stream; the root command is returned unappended so
    /// callers can inspect its operation and target first.
    fn lower_bin_expr(&mut self, node: &Node) -> Result<Command, CompilerError> {
        if node.children.len() == 2 {
            return self.lower_unary(node);
        }
        if node.children.len() != 3 {
            // parser recovery artifact; a diagnostic already exists
            return Ok(Command::new(
                CommandType::Sum,
                Some(Target::Register(self.alloc_register()?)),
                Some(Operand::Value("0".to_string())),
                Some(Operand::Value("0".to_string())),
            ));
        }

        let (operand_a, command_a) = self.lower_sub(&node.children[0])?;
        let (operand_b, command_b) = self.lower_sub(&node.children[2])?;
        if let Some(command) = command_a {
            self.rep.append(command);
        }
        if let Some(command) = command_b {
            self.rep.append(command);
        }

        let operation = Self::operator_command(node.children[1].kind);
        let (operand_a, operand_b) = if operation.is_logical() {
            (self.coerce_bool(operand_a)?, self.coerce_bool(operand_b)?)
        } else {
            (operand_a, operand_b)
        };

        let register_a = operand_a.as_register();
        let register_b = operand_b.as_register();
        let target = match (register_a, register_b) {
            (Some(register), Some(_)) => {
                // two intermediate results merge into one
                if self.free_register > FIRST_FREE_REGISTER {
                    self.free_register -= 1;
                }
                register
            }
            (Some(register), None) | (None, Some(register)) => register,
            (None, None) => self.alloc_register()?,
        };

        Ok(Command::new(
            operation,
            Some(Target::Register(target)),
            Some(operand_a),
            Some(operand_b),
        ))
    }

    fn lower_unary(&mut self, node: &Node) -> Result<Command, CompilerError> {
        let operation = Self::operator_command(node.children[0].kind);
        let (operand, command) = self.lower_sub(&node.children[1])?;
        if let Some(command) = command {
            self.rep.append(command);
        }
        let operand = if operation == CommandType::Not {
            self.coerce_bool(operand)?
        } else {
            operand
        };
        let target = match operand.as_register() {
            Some(register) => register,
            None => self.alloc_register()?,
        };
        Ok(Command::new(
            operation,
            Some(Target::Register(target)),
            Some(operand),
            None,
        ))
    }

    fn lower_sub(&mut self, node: &Node) -> Result<(Operand, Option<Command>), CompilerError> {
        match node.kind {
            NodeKind::BinExpr => {
                let command = self.lower_bin_expr(node)?;
                Ok((Self::target_operand(&command), Some(command)))
            }
            NodeKind::Term => Ok((self.term_operand(node), None)),
            _ => Ok((Operand::Value("0".to_string()), None)),
        }
    }

    /// Literal terms become values, identifiers resolve through the scope
    /// chain. An unresolvable name is a blocking diagnostic; lowering keeps
    /// going with a placeholder so later errors still surface.
    fn term_operand(&mut self, node: &Node) -> Operand {
        let Some(leaf) = node.children.first() else {
            return Operand::Value("0".to_string());
        };
        let value = leaf.value.clone().unwrap_or_default();
        match leaf.kind {
            NodeKind::Value => Operand::Value(value),
            NodeKind::Ident => match self.rep.get_var(&value) {
                Some(variable) => Operand::Variable(variable.clone()),
                None => {
                    let (line, column) = Self::node_position(node);
                    self.registry.register(
                        line,
                        column,
                        DiagnosticKind::UnknownVariable {
                            name: value.clone(),
                        },
                    );
                    Operand::Variable(Variable::new(&value, None, VarType::Int))
                }
            },
            _ => Operand::Value("0".to_string()),
        }
    }

    /// Logical operators only see BOOL operands: everything else first goes
    /// through a CONVERT (`target = operand > 0`), and the converted
    /// register replaces the operand in the consuming command.
    fn coerce_bool(&mut self, operand: Operand) -> Result<Operand, CompilerError> {
        if let Operand::Variable(variable) = &operand {
            if variable.var_type == VarType::Bool {
                return Ok(operand);
            }
        }
        let target = match operand.as_register() {
            Some(register) => register,
            None => self.alloc_register()?,
        };
        self.rep.append(Command::new(
            CommandType::Convert,
            Some(Target::Register(target)),
            Some(operand),
            Some(Operand::Type(VarType::Bool)),
        ));
        Ok(Operand::Register(target))
    }

    // ---- control flow ----

    /// Emits the condition's commands plus the final CMP, returning the
    /// *negated* conditional jump that skips the guarded body.
    fn lower_condition(&mut self, node: &Node) -> Result<CommandType, CompilerError> {
        let jump = match node.kind {
            NodeKind::Term => {
                let operand = self.term_operand(node);
                let is_bool =
                    matches!(&operand, Operand::Variable(v) if v.var_type == VarType::Bool);
                let (compare_to, jump) = if is_bool {
                    ("1", CommandType::Jne)
                } else {
                    ("0", CommandType::Je)
                };
                self.rep.append(Command::cmp(
                    operand,
                    Operand::Value(compare_to.to_string()),
                ));
                jump
            }
            NodeKind::BinExpr => {
                let command = self.lower_bin_expr(node)?;
                if command.operation.is_comparison() {
                    let jump = command.operation.negated_jump().unwrap_or(CommandType::Je);
                    let operand_a = command
                        .operand_a
                        .clone()
                        .unwrap_or(Operand::Value("0".to_string()));
                    let operand_b = command
                        .operand_b
                        .clone()
                        .unwrap_or(Operand::Value("0".to_string()));
                    self.rep.append(Command::cmp(operand_a, operand_b));
                    jump
                } else if command.operation.is_logical() {
                    let result = Self::target_operand(&command);
                    self.rep.append(command);
                    self.rep
                        .append(Command::cmp(result, Operand::Value("1".to_string())));
                    CommandType::Jne
                } else {
                    // arithmetic condition: nonzero means true
                    let result = Self::target_operand(&command);
                    self.rep.append(command);
                    self.rep
                        .append(Command::cmp(result, Operand::Value("0".to_string())));
                    CommandType::Je
                }
            }
            _ => {
                self.rep.append(Command::cmp(
                    Operand::Value("0".to_string()),
                    Operand::Value("0".to_string()),
                ));
                CommandType::Je
            }
        };
        self.free_register = FIRST_FREE_REGISTER;
        Ok(jump)
    }

    fn lower_if(
        &mut self,
        node: &Node,
        depth: usize,
        loop_ctx: Option<LoopContext>,
    ) -> Result<(), CompilerError> {
        let Some(condition) = node.children.first() else {
            return Ok(());
        };
        let jump = self.lower_condition(condition)?;

        let if_end_name = self.generate_label_name("if_end", depth);
        let if_end = self.rep.label_for(&if_end_name);
        let has_tail = node.children.len() > 2;

        // the skip target: the next elif/else when there is one, otherwise
        // straight past the whole construct
        let mut pending: Option<LabelId> = None;
        if has_tail {
            let name = self.generate_label_name("if", depth);
            let id = self.rep.label_for(&name);
            self.rep.append(Command::jump(jump, id));
            pending = Some(id);
        } else {
            self.rep.append(Command::jump(jump, if_end));
        }

        if let Some(body) = node.children.get(1) {
            self.lower_body_scope(body, depth, loop_ctx)?;
        }
        self.rep.append(Command::jump(CommandType::Jmp, if_end));

        for child in node.children.iter().skip(2) {
            match child.kind {
                NodeKind::Elif => {
                    if let Some(id) = pending.take() {
                        self.rep.place_label_id(id);
                    }
                    let Some(condition) = child.children.first() else {
                        continue;
                    };
                    let jump = self.lower_condition(condition)?;
                    let name = self.generate_label_name("elif", depth);
                    let id = self.rep.label_for(&name);
                    self.rep.append(Command::jump(jump, id));
                    pending = Some(id);
                    if let Some(body) = child.children.get(1) {
                        self.lower_body_scope(body, depth, loop_ctx)?;
                    }
                    self.rep.append(Command::jump(CommandType::Jmp, if_end));
                }
                NodeKind::Scope => {
                    if let Some(id) = pending.take() {
                        self.rep.place_label_id(id);
                    }
                    self.lower_body_scope(child, depth, loop_ctx)?;
                }
                _ => {}
            }
        }
        // an elif chain without an else leaves its skip label dangling at
        // the same spot as if_end; compaction merges the two
        if let Some(id) = pending {
            self.rep.place_label_id(id);
        }
        self.rep.place_label_id(if_end);
        Ok(())
    }

    fn lower_while(&mut self, node: &Node, depth: usize) -> Result<(), CompilerError> {
        let Some(condition) = node.children.first() else {
            return Ok(());
        };
        let begin_name = self.generate_label_name("while_begin", depth);
        let end_name = self.generate_label_name("while_end", depth);
        let begin = self.rep.place_label(&begin_name);
        let end = self.rep.label_for(&end_name);

        let jump = self.lower_condition(condition)?;
        self.rep.append(Command::jump(jump, end));

        let ctx = LoopContext {
            break_to: end,
            continue_to: begin,
        };
        if let Some(body) = node.children.get(1) {
            self.lower_body_scope(body, depth, Some(ctx))?;
        }
        self.rep.append(Command::jump(CommandType::Jmp, begin));
        self.rep.place_label_id(end);
        Ok(())
    }

    fn lower_body_scope(
        &mut self,
        node: &Node,
        depth: usize,
        loop_ctx: Option<LoopContext>,
    ) -> Result<(), CompilerError> {
        self.scope_counter += 1;
        let name = format!("scope_{}", self.scope_counter);
        self.rep.add_scope(&name);
        self.rep.append(Command::escalate());
        self.lower_scope(node, depth + 1, loop_ctx)?;
        self.rep.append(Command::deescalate());
        self.rep.close_current_scope();
        Ok(())
    }

    fn lower_loop_jump(&mut self, node: &Node, target: Option<LabelId>, statement: &str) {
        match target {
            Some(id) => self.rep.append(Command::jump(CommandType::Jmp, id)),
            None => {
                let (line, column) = Self::node_position(node);
                self.registry.register(
                    line,
                    column,
                    DiagnosticKind::LoopControlOutsideLoop {
                        statement: statement.to_string(),
                    },
                );
            }
        }
    }

    // ---- records ----

    fn lower_class(&mut self, node: &Node) {
        let Some(name) = node
            .children
            .first()
            .and_then(|t| t.children.first())
            .and_then(|n| n.value.clone())
        else {
            return;
        };
        let mut record = Record::new(&name);
        if let Some(scope) = node.children.get(1) {
            for field in &scope.children {
                let term = match field.kind {
                    NodeKind::Term => field,
                    NodeKind::Stmt => match field.children.first() {
                        Some(term) if term.kind == NodeKind::Term => term,
                        _ => continue,
                    },
                    _ => continue,
                };
                let Some(field_name) = term.children.first().and_then(|n| n.value.clone()) else {
                    continue;
                };
                let annotation = term
                    .children
                    .get(1)
                    .and_then(|t| t.children.first())
                    .and_then(|n| n.value.clone());
                let field_type = match annotation {
                    None => FieldType::Scalar,
                    Some(type_name) => match self.rep.get_record_id(&type_name) {
                        Some(id) => FieldType::Record(id),
                        None => {
                            let (line, column) = Self::node_position(term);
                            self.registry.register(
                                line,
                                column,
                                DiagnosticKind::DoesNotExist { missing: type_name },
                            );
                            FieldType::Scalar
                        }
                    },
                };
                record.add_field(&field_name, field_type);
            }
        }
        self.rep.add_record(record);
    }

    fn lower_record_store(
        &mut self,
        term: &Node,
        target_name: &str,
        annotation: Option<String>,
        expr: &Node,
    ) -> Result<(), CompilerError> {
        let callee = &expr.children[0];
        let Some(callee_name) = callee.children.first().and_then(|n| n.value.clone()) else {
            return Ok(());
        };
        let Some(record_id) = self.rep.get_record_id(&callee_name) else {
            let (line, column) = Self::node_position(callee);
            self.registry.register(
                line,
                column,
                DiagnosticKind::DoesNotExist {
                    missing: callee_name,
                },
            );
            return Ok(());
        };
        if let Some(type_name) = &annotation {
            if *type_name != callee_name {
                let (line, column) = Self::node_position(term);
                self.registry.register(
                    line,
                    column,
                    DiagnosticKind::MismatchToken {
                        expected: type_name.clone(),
                        got: callee_name.clone(),
                    },
                );
            }
        }

        let record = self
            .rep
            .get_record(record_id)
            .cloned()
            .ok_or(CompilerError::MalformedCommand {
                reason: "record id without a record".to_string(),
            })?;
        let mut sources: Vec<Option<FieldSource>> = vec![None; record.field_count()];
        let mut positional = 0usize;

        let params = &expr.children[2];
        for param in &params.children {
            match param.kind {
                // keyword argument: translate the name to its field slot
                NodeKind::Stmt => {
                    let Some(key) = param
                        .children
                        .first()
                        .and_then(|t| t.children.first())
                        .and_then(|n| n.value.clone())
                    else {
                        continue;
                    };
                    match record.get_name_order(&key) {
                        Some(slot) => {
                            if let Some(value) = param.children.get(1) {
                                sources[slot] = Some(self.field_source(value)?);
                            }
                        }
                        None => {
                            let (line, column) = Self::node_position(param);
                            self.registry.register(
                                line,
                                column,
                                DiagnosticKind::UnknownCallParameter {
                                    name: key,
                                    callee: record.name.clone(),
                                },
                            );
                        }
                    }
                }
                _ => {
                    if positional < sources.len() {
                        sources[positional] = Some(self.field_source(param)?);
                        positional += 1;
                    } else {
                        let (line, column) = Self::node_position(param);
                        self.registry.register(
                            line,
                            column,
                            DiagnosticKind::IllegalDeclaration {
                                reason: "more arguments than record fields".to_string(),
                            },
                        );
                    }
                }
            }
        }

        if sources.iter().any(|s| s.is_none()) {
            let (line, column) = Self::node_position(term);
            self.registry.register(
                line,
                column,
                DiagnosticKind::IllegalDeclaration {
                    reason: "not all record fields are given a value".to_string(),
                },
            );
            return Ok(());
        }
        let sources: Vec<FieldSource> = sources.into_iter().flatten().collect();

        if !self.validate_field_types(term, &record, &sources) {
            return Ok(());
        }

        let literal = RecordLiteral::new(record_id, sources);
        let variable = self
            .rep
            .register_var(target_name, None, VarType::Record(record_id));
        self.rep
            .append(Command::store(variable, Operand::Record(literal)));
        self.free_register = FIRST_FREE_REGISTER;
        Ok(())
    }

    /// Scalar fields take literals, registers or scalar variables; record
    /// fields take only variables of the exact record type.
    fn validate_field_types(&mut self, at: &Node, record: &Record, sources: &[FieldSource]) -> bool {
        let mut valid = true;
        for (field_type, source) in record.field_types().iter().zip(sources) {
            let mismatch: Option<(String, String)> = match (field_type, source) {
                (FieldType::Scalar, FieldSource::Variable(v)) if v.is_record() => Some((
                    "a scalar value".to_string(),
                    self.record_name(v.var_type),
                )),
                (FieldType::Record(id), FieldSource::Variable(v)) => {
                    if v.var_type == VarType::Record(*id) {
                        None
                    } else {
                        Some((
                            self.record_name(VarType::Record(*id)),
                            match v.var_type {
                                VarType::Record(_) => self.record_name(v.var_type),
                                _ => "a scalar value".to_string(),
                            },
                        ))
                    }
                }
                (FieldType::Record(id), _) => Some((
                    self.record_name(VarType::Record(*id)),
                    "a scalar value".to_string(),
                )),
                _ => None,
            };
            if let Some((expected, got)) = mismatch {
                let (line, column) = Self::node_position(at);
                self.registry
                    .register(line, column, DiagnosticKind::MismatchToken { expected, got });
                valid = false;
            }
        }
        valid
    }

    fn record_name(&self, var_type: VarType) -> String {
        match var_type {
            VarType::Record(id) => self
                .rep
                .get_record(id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| format!("record#{}", id.0)),
            VarType::Int => "INT".to_string(),
            VarType::Bool => "BOOL".to_string(),
        }
    }

    fn field_source(&mut self, node: &Node) -> Result<FieldSource, CompilerError> {
        match node.kind {
            NodeKind::Term => match self.term_operand(node) {
                Operand::Value(value) => Ok(FieldSource::Value(value)),
                Operand::Variable(variable) => Ok(FieldSource::Variable(variable)),
                Operand::Register(register) => Ok(FieldSource::Register(register)),
                _ => Ok(FieldSource::Value("0".to_string())),
            },
            NodeKind::BinExpr if Self::is_call(node) => {
                let (line, column) = Self::node_position(node);
                self.registry.register(
                    line,
                    column,
                    DiagnosticKind::IllegalDeclaration {
                        reason: "record fields must reference existing record variables"
                            .to_string(),
                    },
                );
                Ok(FieldSource::Value("0".to_string()))
            }
            NodeKind::BinExpr => {
                let command = self.lower_bin_expr(node)?;
                let source = Self::target_operand(&command);
                self.rep.append(command);
                match source {
                    Operand::Register(register) => Ok(FieldSource::Register(register)),
                    _ => Ok(FieldSource::Value("0".to_string())),
                }
            }
            _ => Ok(FieldSource::Value("0".to_string())),
        }
    }

    // ---- helpers ----

    fn alloc_register(&mut self) -> Result<PseudoRegister, CompilerError> {
        let register = PseudoRegister::new(self.free_register)
            .ok_or(CompilerError::RegisterOverflow { limit: 15 })?;
        self.free_register += 1;
        Ok(register)
    }

    fn generate_label_name(&mut self, optype: &str, depth: usize) -> String {
        let base = format!("{}_{}_{}", self.rep.block_name, optype, depth);
        let mut name = base.clone();
        let mut counter = 0;
        while self.used_label_names.contains(&name) {
            counter += 1;
            name = format!("{}_{}", base, counter);
        }
        self.used_label_names.insert(name.clone());
        name
    }

    fn target_operand(command: &Command) -> Operand {
        match &command.target {
            Some(Target::Register(register)) => Operand::Register(*register),
            Some(Target::Variable(variable)) => Operand::Variable(variable.clone()),
            None => Operand::Value("0".to_string()),
        }
    }

    fn is_call(node: &Node) -> bool {
        node.children.len() == 3 && node.children[1].kind == NodeKind::Call
    }

    fn operator_command(kind: NodeKind) -> CommandType {
        match kind {
            NodeKind::Plus => CommandType::Sum,
            NodeKind::Minus => CommandType::Sub,
            NodeKind::Multi => CommandType::Mul,
            NodeKind::Pov => CommandType::Pov,
            NodeKind::Div => CommandType::Div,
            NodeKind::DivFloor => CommandType::Floor,
            NodeKind::Remain => CommandType::Remain,
            NodeKind::And => CommandType::And,
            NodeKind::Or => CommandType::Or,
            NodeKind::Not => CommandType::Not,
            NodeKind::Eq => CommandType::Eq,
            NodeKind::Neq => CommandType::Neq,
            NodeKind::Gt => CommandType::Gt,
            NodeKind::Gte => CommandType::Gte,
            NodeKind::Lt => CommandType::Lt,
            NodeKind::Lte => CommandType::Lte,
            NodeKind::BitAnd => CommandType::BitAnd,
            NodeKind::BitOr => CommandType::BitOr,
            NodeKind::BitXor => CommandType::BitXor,
            NodeKind::BitNot => CommandType::BitNot,
            NodeKind::BitShl => CommandType::BitShl,
            NodeKind::BitShr => CommandType::BitShr,
            _ => CommandType::Sum,
        }
    }

    fn node_position(node: &Node) -> (usize, usize) {
        if let Some(token) = &node.token {
            return (token.line, token.column);
        }
        for child in &node.children {
            let position = Self::node_position(child);
            if position != (1, 1) {
                return position;
            }
        }
        (1, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser::Parser;

    fn build(code: &str) -> (Representation, DiagnosticRegistry) {
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        let ast = Parser::new(tokens, &mut registry).parse();
        let rep = IrBuilder::new(&mut registry).build(&ast).unwrap();
        (rep, registry)
    }

    fn operations(rep: &Representation) -> Vec<CommandType> {
        rep.commands().iter().map(|c| c.operation).collect()
    }

    fn register_of(target: &Option<Target>) -> String {
        match target {
            Some(Target::Register(r)) => r.name(),
            other => panic!("expected register target, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_store() {
        let (rep, registry) = build("x = 1\n");
        assert!(!registry.is_blocking());
        assert_eq!(
            operations(&rep),
            vec![
                CommandType::Escalate,
                CommandType::Store,
                CommandType::Deescalate
            ]
        );
        let store = &rep.commands()[1];
        assert_eq!(
            store.operand_a,
            Some(Operand::Value("1".to_string()))
        );
        match &store.target {
            Some(Target::Variable(v)) => {
                assert_eq!(v.name, "x");
                assert_eq!(v.var_type, VarType::Int);
            }
            other => panic!("expected variable target, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence_lowering_order() {
        // (2*3) first, then 1+_, then (4*5), then the subtraction
        let (rep, registry) = build("x = 1 + 2 * 3 - 4 * 5\n");
        assert!(!registry.is_blocking());
        assert_eq!(
            operations(&rep),
            vec![
                CommandType::Escalate,
                CommandType::Mul,
                CommandType::Sum,
                CommandType::Mul,
                CommandType::Sub,
                CommandType::Store,
                CommandType::Deescalate
            ]
        );
        let commands = rep.commands();
        assert_eq!(register_of(&commands[1].target), "r8");
        assert_eq!(register_of(&commands[2].target), "r8");
        assert_eq!(register_of(&commands[3].target), "r9");
        assert_eq!(register_of(&commands[4].target), "r8");
    }

    #[test]
    fn test_register_counter_resets_between_statements() {
        let (rep, _) = build("x = 1 + 2\ny = 3 + 4\n");
        let targets: Vec<String> = rep
            .commands()
            .iter()
            .filter(|c| c.operation == CommandType::Sum)
            .map(|c| register_of(&c.target))
            .collect();
        assert_eq!(targets, vec!["r8", "r8"]);
    }

    #[test]
    fn test_unknown_variable_is_blocking() {
        let (_, registry) = build("x = y + 1\n");
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("Variable y used before assignment")
        );
    }

    #[test]
    fn test_variable_source_store() {
        let (rep, registry) = build("x = 1\ny = x\n");
        assert!(!registry.is_blocking());
        let store = &rep.commands()[2];
        assert!(matches!(
            store.operand_a,
            Some(Operand::Variable(ref v)) if v.name == "x"
        ));
    }

    #[test]
    fn test_comparison_result_registers_bool() {
        let (rep, _) = build("b = 1 == 2\nif b:\n    x = 1\n");
        // the condition on a BOOL variable compares against 1 and skips
        // with JNE
        let cmp = rep
            .commands()
            .iter()
            .position(|c| c.operation == CommandType::Cmp)
            .unwrap();
        let commands = rep.commands();
        assert!(matches!(
            commands[cmp].operand_a,
            Some(Operand::Variable(ref v)) if v.var_type == VarType::Bool
        ));
        assert_eq!(
            commands[cmp].operand_b,
            Some(Operand::Value("1".to_string()))
        );
        assert_eq!(commands[cmp + 1].operation, CommandType::Jne);
    }

    #[test]
    fn test_logical_operands_are_converted() {
        let (rep, _) = build("x = 1 and 2\n");
        let ops = operations(&rep);
        let converts = ops
            .iter()
            .filter(|o| **o == CommandType::Convert)
            .count();
        assert_eq!(converts, 2);
        let and_index = ops.iter().position(|o| *o == CommandType::And).unwrap();
        let and = &rep.commands()[and_index];
        assert!(matches!(and.operand_a, Some(Operand::Register(_))));
        assert!(matches!(and.operand_b, Some(Operand::Register(_))));
    }

    #[test]
    fn test_bool_variable_skips_conversion() {
        let (rep, _) = build("b = 1 == 2\nc = 3 == 4\nd = b and c\n");
        assert_eq!(
            operations(&rep)
                .iter()
                .filter(|o| **o == CommandType::Convert)
                .count(),
            0
        );
    }

    #[test]
    fn test_if_without_tail() {
        let code = "x = 1\nif x == 1:\n    x = 2\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        let ops = operations(&rep);
        assert_eq!(
            ops,
            vec![
                CommandType::Escalate,
                CommandType::Store,
                CommandType::Cmp,
                CommandType::Jne,
                CommandType::Escalate,
                CommandType::Store,
                CommandType::Deescalate,
                CommandType::Jmp,
                CommandType::Deescalate,
            ]
        );
        // both jumps point at if_end, placed after the body
        let end = rep.get_label_id("main_if_end_0").unwrap();
        assert_eq!(rep.label(end).unwrap().position, Some(8));
    }

    #[test]
    fn test_if_elif_else_shape() {
        let code = "x = 1\ny = 2\nif x == y:\n    x = 2\nelif x > y:\n    x -= y\nelse:\n    x += y\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());

        let commands = rep.commands();
        // first condition: CMP then JNE to the elif chain
        let first_cmp = commands
            .iter()
            .position(|c| c.operation == CommandType::Cmp)
            .unwrap();
        assert_eq!(commands[first_cmp + 1].operation, CommandType::Jne);
        let elif_label = rep.get_label_id("main_if_0").unwrap();
        assert_eq!(
            commands[first_cmp + 1].operand_a,
            Some(Operand::Label(elif_label))
        );

        // second condition: x > y skips with JLE
        assert!(
            commands
                .iter()
                .any(|c| c.operation == CommandType::Jle)
        );

        // the elif label sits exactly where the second condition starts
        let elif_position = rep.label(elif_label).unwrap().position.unwrap();
        assert_eq!(commands[elif_position].operation, CommandType::Cmp);

        // if_end is placed at the very end
        let end = rep.get_label_id("main_if_end_0").unwrap();
        assert!(rep.label(end).unwrap().position.is_some());
    }

    #[test]
    fn test_elif_without_else_places_dangling_label() {
        let code = "x = 1\nif x == 1:\n    x = 2\nelif x == 3:\n    x = 4\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        // after compaction every jump target is placed
        for command in rep.commands() {
            if let Some(Operand::Label(id)) = &command.operand_a {
                assert!(
                    rep.label(*id).unwrap().position.is_some(),
                    "unplaced label {:?}",
                    rep.label(*id)
                );
            }
        }
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let code = "x = 0\nwhile x < 10:\n    if x == 5:\n        break\n    x += 1\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());

        let begin = rep.get_label_id("main_while_begin_0").unwrap();
        let end = rep.get_label_id("main_while_end_0").unwrap();
        let begin_position = rep.label(begin).unwrap().position.unwrap();
        let end_position = rep.label(end).unwrap().position.unwrap();

        let commands = rep.commands();
        // while_begin precedes the condition
        assert_eq!(commands[begin_position].operation, CommandType::Cmp);
        // the negated condition jump goes to while_end
        assert_eq!(commands[begin_position + 1].operation, CommandType::Jge);
        assert_eq!(
            commands[begin_position + 1].operand_a,
            Some(Operand::Label(end))
        );
        // the break becomes JMP while_end from inside the body
        let break_jump = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.operation == CommandType::Jmp)
            .find(|(_, c)| c.operand_a == Some(Operand::Label(end)))
            .map(|(i, _)| i);
        assert!(break_jump.is_some());
        assert!(break_jump.unwrap() < end_position);
        // the loop tail jumps back to while_begin
        assert!(
            commands
                .iter()
                .any(|c| c.operation == CommandType::Jmp
                    && c.operand_a == Some(Operand::Label(begin)))
        );
    }

    #[test]
    fn test_break_outside_loop_is_reported() {
        let (_, registry) = build("break\n");
        assert!(registry.is_blocking());
        assert!(registry.display().contains("'break' used outside of a loop"));
    }

    #[test]
    fn test_escalate_deescalate_match_and_nest() {
        let code = "x = 0\nwhile x < 3:\n    if x == 1:\n        y = 1\n    x += 1\n";
        let (rep, _) = build(code);
        let mut depth: i32 = 0;
        for command in rep.commands() {
            match command.operation {
                CommandType::Escalate => depth += 1,
                CommandType::Deescalate => {
                    depth -= 1;
                    assert!(depth >= 0, "deescalate without matching escalate");
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_target_invariant() {
        let code = "x = 1\nif x == 1:\n    y = x + 2\nwhile x < 5:\n    x += 1\n";
        let (rep, _) = build(code);
        for command in rep.commands() {
            if command.operation.requires_target() {
                assert!(
                    command.target.is_some(),
                    "command {:?} is missing a target",
                    command.operation
                );
            }
        }
    }

    #[test]
    fn test_label_positions_in_bounds() {
        let code = "x = 0\nwhile x < 3:\n    x += 1\nif x == 3:\n    x = 0\n";
        let (rep, _) = build(code);
        for label in rep.labels() {
            let position = label.position.unwrap();
            assert!(position <= rep.commands().len());
        }
    }

    #[test]
    fn test_ir_building_is_deterministic() {
        let code = "x = 1\ny = 2\nif x == y:\n    x = 2\nelse:\n    y = 3\nwhile x < 9:\n    x += 1\n";
        let (first, _) = build(code);
        let (second, _) = build(code);
        assert_eq!(first.pprint(), second.pprint());
        assert_eq!(first.pprint_vars(), second.pprint_vars());
    }

    #[test]
    fn test_record_declaration_and_construction() {
        let code = "class Point:\n    x\n    y\np = Point(3, 4)\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        let id = rep.get_record_id("Point").unwrap();
        assert_eq!(rep.get_record(id).unwrap().field_count(), 2);

        let store = rep
            .commands()
            .iter()
            .find(|c| c.operation == CommandType::Store)
            .unwrap();
        match &store.operand_a {
            Some(Operand::Record(literal)) => {
                assert_eq!(literal.record, id);
                assert_eq!(
                    literal.sources,
                    vec![
                        FieldSource::Value("3".to_string()),
                        FieldSource::Value("4".to_string())
                    ]
                );
            }
            other => panic!("expected record literal, got {:?}", other),
        }
        match &store.target {
            Some(Target::Variable(v)) => assert_eq!(v.var_type, VarType::Record(id)),
            other => panic!("expected variable target, got {:?}", other),
        }
    }

    #[test]
    fn test_record_keyword_arguments_map_to_slots() {
        let code = "class Point:\n    x\n    y\np = Point(y = 4, x = 3)\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        let store = rep
            .commands()
            .iter()
            .find(|c| c.operation == CommandType::Store)
            .unwrap();
        match &store.operand_a {
            Some(Operand::Record(literal)) => {
                // declared order: x first, then y
                assert_eq!(
                    literal.sources,
                    vec![
                        FieldSource::Value("3".to_string()),
                        FieldSource::Value("4".to_string())
                    ]
                );
            }
            other => panic!("expected record literal, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_record_field_is_reported() {
        let code = "class Point:\n    x\n    y\np = Point(z = 1, x = 2)\n";
        let (_, registry) = build(code);
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("Unknown call parameter by the name z")
        );
    }

    #[test]
    fn test_unknown_record_type_is_reported() {
        let (_, registry) = build("p = Point(3, 4)\n");
        assert!(registry.is_blocking());
        assert!(registry.display().contains("Point does not exist"));
    }

    #[test]
    fn test_missing_record_field_is_reported() {
        let code = "class Point:\n    x\n    y\np = Point(3)\n";
        let (_, registry) = build(code);
        assert!(registry.is_blocking());
        assert!(
            registry
                .display()
                .contains("not all record fields are given a value")
        );
    }

    #[test]
    fn test_nested_record_field_takes_record_variable() {
        let code = "class Point:\n    x\n    y\nclass Line:\n    start: Point\n    finish: Point\na = Point(0, 0)\nb = Point(3, 4)\nl = Line(a, b)\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        let line_id = rep.get_record_id("Line").unwrap();
        let point_id = rep.get_record_id("Point").unwrap();
        assert_eq!(
            rep.get_record(line_id).unwrap().field_types(),
            &[FieldType::Record(point_id), FieldType::Record(point_id)]
        );
        let store = rep
            .commands()
            .iter()
            .filter(|c| c.operation == CommandType::Store)
            .last()
            .unwrap();
        match &store.operand_a {
            Some(Operand::Record(literal)) => {
                assert!(matches!(
                    &literal.sources[0],
                    FieldSource::Variable(v) if v.var_type == VarType::Record(point_id)
                ));
            }
            other => panic!("expected record literal, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_source_for_record_field_is_reported() {
        let code = "class Point:\n    x\n    y\nclass Line:\n    start: Point\n    finish: Point\nl = Line(1, 2)\n";
        let (_, registry) = build(code);
        assert!(registry.is_blocking());
        assert!(registry.display().contains("Expected Point here"));
    }

    #[test]
    fn test_record_expression_field_lowers_to_register() {
        let code = "class Point:\n    x\n    y\np = Point(1 + 2, 4)\n";
        let (rep, registry) = build(code);
        assert!(!registry.is_blocking(), "{}", registry.display());
        let sum = rep
            .commands()
            .iter()
            .position(|c| c.operation == CommandType::Sum)
            .unwrap();
        let store = rep
            .commands()
            .iter()
            .position(|c| c.operation == CommandType::Store)
            .unwrap();
        assert!(sum < store);
        let store = &rep.commands()[store];
        match &store.operand_a {
            Some(Operand::Record(literal)) => {
                assert!(matches!(literal.sources[0], FieldSource::Register(_)));
            }
            other => panic!("expected record literal, got {:?}", other),
        }
    }

    #[test]
    fn test_label_name_collisions_get_suffixes() {
        let code = "x = 1\nif x == 1:\n    x = 2\nif x == 2:\n    x = 3\n";
        let (rep, _) = build(code);
        assert!(rep.get_label_id("main_if_end_0").is_some());
        assert!(rep.get_label_id("main_if_end_0_1").is_some());
    }

    #[test]
    fn test_multi_target_lowering_order() {
        let (rep, registry) = build("x, y = 34 + 35, 190 + 230\n");
        assert!(!registry.is_blocking());
        assert_eq!(
            operations(&rep),
            vec![
                CommandType::Escalate,
                CommandType::Sum,
                CommandType::Store,
                CommandType::Sum,
                CommandType::Store,
                CommandType::Deescalate,
            ]
        );
        let stores: Vec<String> = rep
            .commands()
            .iter()
            .filter(|c| c.operation == CommandType::Store)
            .map(|c| match &c.target {
                Some(Target::Variable(v)) => v.name.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(stores, vec!["x", "y"]);
    }
}
