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

use std::collections::HashMap;

use crate::ir::command::{Command, Operand, Target};
use crate::ir::label::{Label, LabelId};
use crate::ir::record::{FieldSource, Record, RecordId};
use crate::ir::scope::Scope;
use crate::ir::variable::{VarType, Variable};

/// One step of ordered iteration: the command, the innermost scope that
/// encloses it, and the label placed at its position, if any.
pub struct IterStep<'a> {
    pub command: &'a Command,
    pub scope: Option<&'a Scope>,
    pub label: Option<&'a Label>,
}

/// The IR container: an ordered command stream plus the label table, the
/// scope list and the record table that give the commands meaning.
#[derive(Debug, Default)]
pub struct Representation {
    pub block_name: String,
    commands: Vec<Command>,
    labels: Vec<Label>,
    label_ids: HashMap<String, LabelId>,
    scopes: Vec<Scope>,
    open_scopes: Vec<usize>,
    records: Vec<Record>,
    record_ids: HashMap<String, RecordId>,
}

impl Representation {
    pub fn new(block_name: &str) -> Self {
        Representation {
            block_name: block_name.to_string(),
            ..Default::default()
        }
    }

    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    // ---- labels ----

    /// Gets or creates a label by name without placing it; jumps reference
    /// labels this way before the target position is known.
    pub fn label_for(&mut self, name: &str) -> LabelId {
        if let Some(&id) = self.label_ids.get(name) {
            return id;
        }
        let id = LabelId(self.labels.len());
        self.labels.push(Label::unplaced(name));
        self.label_ids.insert(name.to_string(), id);
        id
    }

    /// Places a label at the current end of the command stream.
    pub fn place_label(&mut self, name: &str) -> LabelId {
        let id = self.label_for(name);
        self.labels[id.0].position = Some(self.commands.len());
        id
    }

    pub fn place_label_id(&mut self, id: LabelId) {
        if let Some(label) = self.labels.get_mut(id.0) {
            label.position = Some(self.commands.len());
        }
    }

    pub fn label(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(id.0)
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get_label_id(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    /// Merges labels that resolve to the same command position, re-pointing
    /// every jump at the survivor (the first label placed there).
    pub fn compact_labels(&mut self) {
        let mut survivors: Vec<Label> = Vec::new();
        let mut new_ids: HashMap<String, LabelId> = HashMap::new();
        let mut position_owner: HashMap<usize, LabelId> = HashMap::new();
        let mut remap: Vec<LabelId> = Vec::with_capacity(self.labels.len());

        for label in &self.labels {
            let target = match label.position {
                Some(position) => match position_owner.get(&position) {
                    Some(&owner) => owner,
                    None => {
                        let id = LabelId(survivors.len());
                        survivors.push(label.clone());
                        new_ids.insert(label.name.clone(), id);
                        position_owner.insert(position, id);
                        id
                    }
                },
                // unplaced labels survive; codegen rejects jumps to them
                None => {
                    let id = LabelId(survivors.len());
                    survivors.push(label.clone());
                    new_ids.insert(label.name.clone(), id);
                    id
                }
            };
            remap.push(target);
        }

        for command in &mut self.commands {
            if let Some(Operand::Label(id)) = &mut command.operand_a {
                if let Some(new_id) = remap.get(id.0) {
                    *id = *new_id;
                }
            }
        }
        self.labels = survivors;
        self.label_ids = new_ids;
    }

    pub fn label_at(&self, position: usize) -> Option<&Label> {
        self.labels.iter().find(|l| l.position == Some(position))
    }

    // ---- scopes ----

    pub fn add_scope(&mut self, name: &str) {
        let scope = Scope::new(name, self.commands.len());
        self.open_scopes.push(self.scopes.len());
        self.scopes.push(scope);
    }

    pub fn close_current_scope(&mut self) {
        if let Some(index) = self.open_scopes.pop() {
            self.scopes[index].end = Some(self.commands.len().saturating_sub(1));
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Registers a variable in the innermost open scope.
    pub fn register_var(
        &mut self,
        name: &str,
        value: Option<String>,
        var_type: VarType,
    ) -> Variable {
        match self.open_scopes.last() {
            Some(&index) => self.scopes[index].register_var(name, value, var_type),
            None => Variable::new(name, value, var_type),
        }
    }

    /// Resolves a variable by walking the open scopes from the innermost
    /// outward.
    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        for &index in self.open_scopes.iter().rev() {
            if let Some(variable) = self.scopes[index].get_var(name) {
                return Some(variable);
            }
        }
        None
    }

    fn scope_for(&self, command_index: usize) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.contains(command_index))
    }

    // ---- records ----

    pub fn add_record(&mut self, record: Record) -> RecordId {
        if let Some(&id) = self.record_ids.get(&record.name) {
            self.records[id.0] = record;
            return id;
        }
        let id = RecordId(self.records.len());
        self.record_ids.insert(record.name.clone(), id);
        self.records.push(record);
        id
    }

    pub fn get_record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.0)
    }

    pub fn get_record_id(&self, name: &str) -> Option<RecordId> {
        self.record_ids.get(name).copied()
    }

    // ---- iteration ----

    pub fn iter(&self) -> impl Iterator<Item = IterStep<'_>> {
        let positions: HashMap<usize, usize> = self
            .labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.position.map(|p| (p, i)))
            .collect();
        self.commands.iter().enumerate().map(move |(index, command)| IterStep {
            command,
            scope: self.scope_for(index),
            label: positions.get(&index).map(|&i| &self.labels[i]),
        })
    }

    // ---- pretty printing ----

    pub fn pprint(&self) -> String {
        let mut out = format!("{}:\n", self.block_name);
        for (index, command) in self.commands.iter().enumerate() {
            if let Some(label) = self.label_at(index) {
                out.push_str(&format!("{}:\n", label.name));
            }
            out.push_str(&format!("   {}\n", self.render_command(command)));
        }
        if let Some(label) = self.label_at(self.commands.len()) {
            out.push_str(&format!("{}:\n", label.name));
        }
        out
    }

    pub fn pprint_vars(&self) -> String {
        let mut out = format!("{} scopes:\n", self.block_name);
        for scope in &self.scopes {
            out.push_str(&scope.pprint_vars());
        }
        out
    }

    fn render_command(&self, command: &Command) -> String {
        let mut text = command.operation.to_string();
        if let Some(operand) = &command.operand_a {
            text.push(' ');
            text.push_str(&self.render_operand(operand));
        }
        if let Some(operand) = &command.operand_b {
            text.push_str(", ");
            text.push_str(&self.render_operand(operand));
        }
        match &command.target {
            Some(Target::Register(register)) => format!("{} = {}", register, text),
            Some(Target::Variable(variable)) => format!("{} = {}", variable.name, text),
            None => text,
        }
    }

    fn render_operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Value(value) => value.clone(),
            Operand::Register(register) => register.to_string(),
            Operand::Variable(variable) => variable.name.clone(),
            Operand::Label(id) => self
                .label(*id)
                .map(|l| l.name.clone())
                .unwrap_or_else(|| format!("label#{}", id.0)),
            Operand::Type(VarType::Bool) => "BOOL".to_string(),
            Operand::Type(VarType::Int) => "INT".to_string(),
            Operand::Type(VarType::Record(id)) => self
                .get_record(*id)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| format!("record#{}", id.0)),
            Operand::Record(literal) => {
                let record_name = self
                    .get_record(literal.record)
                    .map(|r| r.name.clone())
                    .unwrap_or_else(|| format!("record#{}", literal.record.0));
                let fields: Vec<String> = literal
                    .sources
                    .iter()
                    .map(|source| match source {
                        FieldSource::Value(value) => value.clone(),
                        FieldSource::Register(register) => register.to_string(),
                        FieldSource::Variable(variable) => variable.name.clone(),
                    })
                    .collect();
                format!("{}({})", record_name, fields.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::command::CommandType;
    use crate::ir::register::PseudoRegister;

    fn value(text: &str) -> Operand {
        Operand::Value(text.to_string())
    }

    #[test]
    fn test_forward_label_reference_then_place() {
        let mut rep = Representation::new("main");
        let id = rep.label_for("main_while_end_0");
        assert!(rep.label(id).unwrap().position.is_none());
        rep.append(Command::jump(CommandType::Jmp, id));
        rep.place_label_id(id);
        assert_eq!(rep.label(id).unwrap().position, Some(1));
    }

    #[test]
    fn test_label_compaction_merges_same_position() {
        let mut rep = Representation::new("main");
        let first = rep.label_for("main_if_end_0");
        let second = rep.label_for("main_elif_0");
        rep.append(Command::jump(CommandType::Jmp, first));
        rep.append(Command::jump(CommandType::Jne, second));
        rep.place_label_id(first);
        rep.place_label_id(second);
        rep.compact_labels();

        assert_eq!(rep.labels().len(), 1);
        let survivor = rep.get_label_id("main_if_end_0").unwrap();
        for command in rep.commands() {
            match &command.operand_a {
                Some(Operand::Label(id)) => assert_eq!(*id, survivor),
                other => panic!("unexpected operand {:?}", other),
            }
        }
    }

    #[test]
    fn test_compaction_keeps_distinct_positions() {
        let mut rep = Representation::new("main");
        let first = rep.label_for("a");
        rep.place_label_id(first);
        rep.append(Command::escalate());
        let second = rep.label_for("b");
        rep.place_label_id(second);
        rep.compact_labels();
        assert_eq!(rep.labels().len(), 2);
    }

    #[test]
    fn test_scope_variable_resolution_walks_outward() {
        let mut rep = Representation::new("main");
        rep.add_scope("main");
        rep.register_var("x", None, VarType::Int);
        rep.add_scope("scope_1");
        rep.register_var("y", None, VarType::Bool);
        assert_eq!(rep.get_var("x").unwrap().var_type, VarType::Int);
        assert_eq!(rep.get_var("y").unwrap().var_type, VarType::Bool);
        rep.close_current_scope();
        assert!(rep.get_var("y").is_none());
        assert!(rep.get_var("x").is_some());
    }

    #[test]
    fn test_iteration_yields_labels_and_scopes() {
        let mut rep = Representation::new("main");
        rep.add_scope("main");
        rep.append(Command::escalate());
        rep.place_label("main_while_begin_0");
        rep.append(Command::cmp(value("1"), value("0")));
        rep.append(Command::deescalate());
        rep.close_current_scope();

        let steps: Vec<_> = rep.iter().collect();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].label.is_none());
        assert_eq!(steps[1].label.unwrap().name, "main_while_begin_0");
        assert!(steps[1].scope.is_some());
    }

    #[test]
    fn test_record_table() {
        let mut rep = Representation::new("main");
        let mut record = Record::new("Point");
        record.add_field("x", crate::ir::record::FieldType::Scalar);
        let id = rep.add_record(record);
        assert_eq!(rep.get_record_id("Point"), Some(id));
        assert_eq!(rep.get_record(id).unwrap().field_count(), 1);
    }

    #[test]
    fn test_pprint_renders_labels_and_targets() {
        let mut rep = Representation::new("main");
        rep.add_scope("main");
        let reg = PseudoRegister::new(8).unwrap();
        rep.append(Command::new(
            CommandType::Sum,
            Some(Target::Register(reg)),
            Some(value("1")),
            Some(value("2")),
        ));
        let end = rep.label_for("main_if_end_0");
        rep.append(Command::jump(CommandType::Jmp, end));
        rep.place_label_id(end);
        rep.close_current_scope();

        let printed = rep.pprint();
        assert!(printed.contains("r8 = SUM 1, 2"));
        assert!(printed.contains("JMP main_if_end_0"));
        assert!(printed.ends_with("main_if_end_0:\n"));
    }
}
