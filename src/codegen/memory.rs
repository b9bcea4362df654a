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

use crate::codegen::instruction::{Instruction, Opcode};
use crate::codegen::registers::physical;
use crate::errors::CompilerError;
use crate::ir::record::{FieldSource, RecordLiteral};
use crate::ir::register::PseudoRegister;
use crate::ir::variable::Variable;

/// A unit of stack storage: one scalar slot, a record aggregate of nested
/// regions, or a pointer slot referencing another region's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub addr: usize,
    pub size: usize,
    pub nested: Vec<MemoryRegion>,
    pub is_pointer: bool,
}

impl MemoryRegion {
    fn scalar(name: &str, addr: usize, is_pointer: bool) -> Self {
        MemoryRegion {
            name: name.to_string(),
            addr,
            size: 1,
            nested: Vec::new(),
            is_pointer,
        }
    }
}

/// What a store reads from; a thin view over the IR operand kinds that can
/// feed memory.
pub enum SourceRef<'a> {
    Value(&'a str),
    Register(&'a PseudoRegister),
    Variable(&'a Variable),
}

/// Owns the stack layout: an ordered list of live regions mirroring what has
/// been pushed, plus the scope boundaries driving reclamation. The offset of
/// a region is `(total_slots − slots_before_it − 1) × 8`, i.e. the most
/// recently pushed region sits at `[rsp + 0]`.
#[derive(Debug, Default)]
pub struct MemoryManager {
    regions: Vec<MemoryRegion>,
    boundaries: Vec<usize>,
    current_boundary: usize,
}

impl MemoryManager {
    pub fn new() -> Self {
        MemoryManager::default()
    }

    pub fn escalate(&mut self) {
        self.boundaries.push(self.current_boundary);
        self.current_boundary = self.regions.len();
    }

    /// Frees every region created since the matching escalate, newest
    /// boundary first.
    pub fn deescalate(&mut self) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        for region in &self.regions[self.current_boundary..] {
            instructions.push(Instruction::MathLogic {
                op: Opcode::Add,
                dst: "rsp".to_string(),
                src: Some((region.size * 8).to_string()),
            });
        }
        self.regions.truncate(self.current_boundary);
        self.current_boundary = self.boundaries.pop().unwrap_or(0);
        instructions
    }

    /// Stores a scalar: a push for a fresh name, a targeted `mov` over the
    /// existing slot otherwise.
    pub fn store_scalar(
        &mut self,
        name: &str,
        source: SourceRef,
    ) -> Result<Vec<Instruction>, CompilerError> {
        match self.get_region_index(name) {
            Some(index) => {
                let offset = self.region_offset(index);
                self.store_value(source, Some(offset))
            }
            None => {
                let instructions = self.store_value(source, None)?;
                let addr = self.regions.len();
                self.regions.push(MemoryRegion::scalar(name, addr, false));
                Ok(instructions)
            }
        }
    }

    /// Stores a record literal. Fresh names allocate the parent region and
    /// push field by field; re-declarations overwrite the existing slots in
    /// place. A field sourced from a record variable stores a pointer to
    /// that variable's storage instead of copying it.
    pub fn store_record(
        &mut self,
        name: &str,
        literal: &RecordLiteral,
    ) -> Result<Vec<Instruction>, CompilerError> {
        match self.get_region_index(name) {
            Some(index) => self.overwrite_record(index, literal),
            None => self.declare_record(name, literal),
        }
    }

    fn declare_record(
        &mut self,
        name: &str,
        literal: &RecordLiteral,
    ) -> Result<Vec<Instruction>, CompilerError> {
        let parent_index = self.regions.len();
        self.regions.push(MemoryRegion {
            name: name.to_string(),
            addr: parent_index,
            size: 0,
            nested: Vec::new(),
            is_pointer: false,
        });

        let mut instructions = Vec::new();
        for (slot, source) in literal.sources.iter().enumerate() {
            let child_name = format!("{}.{}", name, slot);
            let child = match source {
                FieldSource::Variable(variable) if variable.is_record() => {
                    instructions.extend(self.pointer_to(variable)?);
                    instructions.push(Instruction::push("rax"));
                    MemoryRegion::scalar(&child_name, slot, true)
                }
                FieldSource::Value(value) => {
                    instructions.extend(self.store_value(SourceRef::Value(value.as_str()), None)?);
                    MemoryRegion::scalar(&child_name, slot, false)
                }
                FieldSource::Register(register) => {
                    instructions.extend(self.store_value(SourceRef::Register(register), None)?);
                    MemoryRegion::scalar(&child_name, slot, false)
                }
                FieldSource::Variable(variable) => {
                    instructions.extend(self.store_value(SourceRef::Variable(variable), None)?);
                    MemoryRegion::scalar(&child_name, slot, false)
                }
            };
            // grow the parent before the next field so later offsets see
            // this push
            let parent = &mut self.regions[parent_index];
            parent.nested.push(child);
            parent.size += 1;
        }
        Ok(instructions)
    }

    fn overwrite_record(
        &mut self,
        index: usize,
        literal: &RecordLiteral,
    ) -> Result<Vec<Instruction>, CompilerError> {
        let parent_offset = self.region_offset(index);
        let mut instructions = Vec::new();
        for (slot, source) in literal.sources.iter().enumerate() {
            let slot_offset = parent_offset - slot * 8;
            match source {
                FieldSource::Variable(variable) if variable.is_record() => {
                    instructions.extend(self.pointer_to(variable)?);
                    instructions.push(Instruction::mov(&dereference(slot_offset), "rax"));
                }
                FieldSource::Value(value) => {
                    instructions.extend(
                        self.store_value(SourceRef::Value(value.as_str()), Some(slot_offset))?,
                    );
                }
                FieldSource::Register(register) => {
                    instructions.extend(
                        self.store_value(SourceRef::Register(register), Some(slot_offset))?,
                    );
                }
                FieldSource::Variable(variable) => {
                    instructions.extend(
                        self.store_value(SourceRef::Variable(variable), Some(slot_offset))?,
                    );
                }
            }
        }
        Ok(instructions)
    }

    // rax <- address of the variable's storage
    fn pointer_to(&self, variable: &Variable) -> Result<Vec<Instruction>, CompilerError> {
        let index = self
            .get_region_index(&variable.name)
            .ok_or(CompilerError::UnknownRegion {
                name: variable.name.clone(),
            })?;
        let offset = self.region_offset(index);
        Ok(vec![
            Instruction::mov("rax", "rsp"),
            Instruction::MathLogic {
                op: Opcode::Add,
                dst: "rax".to_string(),
                src: Some(offset.to_string()),
            },
        ])
    }

    /// Shared store path: `destination_offset` selects between overwriting
    /// an existing slot and pushing a fresh one. Literals and variables go
    /// through `rax` because they cannot be memory-to-memory operands.
    fn store_value(
        &self,
        source: SourceRef,
        destination_offset: Option<usize>,
    ) -> Result<Vec<Instruction>, CompilerError> {
        let mut instructions = Vec::new();
        match source {
            SourceRef::Register(register) => {
                let name = physical(register)?;
                match destination_offset {
                    Some(offset) => instructions.push(Instruction::mov(&dereference(offset), name)),
                    None => instructions.push(Instruction::push(name)),
                }
            }
            SourceRef::Value(value) => {
                instructions.push(Instruction::mov("rax", value));
                match destination_offset {
                    Some(offset) => {
                        instructions.push(Instruction::mov(&dereference(offset), "rax"))
                    }
                    None => instructions.push(Instruction::push("rax")),
                }
            }
            SourceRef::Variable(variable) => {
                let index =
                    self.get_region_index(&variable.name)
                        .ok_or(CompilerError::UnknownRegion {
                            name: variable.name.clone(),
                        })?;
                let offset = self.region_offset(index);
                instructions.push(Instruction::mov("rax", &dereference(offset)));
                match destination_offset {
                    Some(offset) => {
                        instructions.push(Instruction::mov(&dereference(offset), "rax"))
                    }
                    None => instructions.push(Instruction::push("rax")),
                }
            }
        }
        Ok(instructions)
    }

    pub fn get_region_index(&self, name: &str) -> Option<usize> {
        self.regions.iter().position(|region| region.name == name)
    }

    pub fn region_offset(&self, index: usize) -> usize {
        let total: usize = self.total_slots();
        let before: usize = self.regions[..index].iter().map(|r| r.size).sum();
        (total - before - 1) * 8
    }

    pub fn variable_offset(&self, name: &str) -> Result<usize, CompilerError> {
        let index = self
            .get_region_index(name)
            .ok_or(CompilerError::UnknownRegion {
                name: name.to_string(),
            })?;
        Ok(self.region_offset(index))
    }

    pub fn total_slots(&self) -> usize {
        self.regions.iter().map(|r| r.size).sum()
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }
}

pub fn dereference(offset: usize) -> String {
    format!("QWORD [rsp + {}]", offset)
}
