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

use crate::ir::register::PseudoRegister;
use crate::ir::variable::Variable;

/// Stable identifier of a record type inside one `Representation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Scalar,
    Record(RecordId),
}

/// A user-defined structure: ordered field names with their types. Field
/// order is declaration order, which is what positional construction and
/// stack layout rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    field_names: Vec<String>,
    field_types: Vec<FieldType>,
}

impl Record {
    pub fn new(name: &str) -> Self {
        Record {
            name: name.to_string(),
            field_names: Vec::new(),
            field_types: Vec::new(),
        }
    }

    pub fn add_field(&mut self, name: &str, field_type: FieldType) {
        self.field_names.push(name.to_string());
        self.field_types.push(field_type);
    }

    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_types(&self) -> &[FieldType] {
        &self.field_types
    }

    /// Positional slot of a named field.
    pub fn get_name_order(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|n| n == name)
    }

    /// Total size in 8-byte slots. Record-typed fields are stored as
    /// pointers, so every field occupies exactly one slot.
    pub fn calculate_size(&self) -> usize {
        self.field_names.len()
    }
}

/// One source feeding a record field at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    Value(String),
    Register(PseudoRegister),
    Variable(Variable),
}

/// A typed aggregate value at IR level: which record is being built and, in
/// declared field order, where each field's bytes come from. The IR builder
/// validates arity and per-field types before constructing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLiteral {
    pub record: RecordId,
    pub sources: Vec<FieldSource>,
}

impl RecordLiteral {
    pub fn new(record: RecordId, sources: Vec<FieldSource>) -> Self {
        RecordLiteral { record, sources }
    }
}
