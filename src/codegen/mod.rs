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

pub mod instruction;
pub mod memory;
pub mod registers;

use crate::errors::CompilerError;
use crate::ir::command::{Command, CommandType, Operand, Target};
use crate::ir::register::{FIRST_FREE_REGISTER, PseudoRegister};
use crate::ir::representation::Representation;
use instruction::{Instruction, Opcode};
use memory::{MemoryManager, SourceRef, dereference};
use registers::physical;

// rcx carries materialized booleans and shift counts
const SCRATCH: PseudoRegister = PseudoRegister { order: 2, size: 8 };
const SCRATCH_LOW: PseudoRegister = PseudoRegister { order: 2, size: 1 };

const RELEASE_HEADER: &str = "section .text\nglobal _start\n\n_start:\n";
const DEBUG_HEADER: &str =
    "section .text\n    default rel\n    extern printf\n    extern exit\n    global main\n\nmain:\n";
const DEBUG_DATA: &str = "\nsection .data\n    formatString: db '%llu', 10, 0\n";

/// Walks the representation in order and renders NASM text. Stack layout for
/// variables and records is delegated to the `MemoryManager`; everything
/// register-shaped happens here.
pub struct CodeGen {
    debug: bool,
    memory: MemoryManager,
    chunks: Vec<Instruction>,
}

impl CodeGen {
    pub fn new(debug: bool) -> Self {
        CodeGen {
            debug,
            memory: MemoryManager::new(),
            chunks: Vec::new(),
        }
    }

    pub fn generate(mut self, rep: &Representation) -> Result<String, CompilerError> {
        let total = rep.commands().len();
        for (index, step) in rep.iter().enumerate() {
            if let Some(label) = step.label {
                self.chunks.push(Instruction::Label(label.name.clone()));
            }
            let command = step.command;
            match command.operation {
                CommandType::Store => self.generate_store(command)?,
                CommandType::Sum => self.generate_binop(command, Opcode::Add)?,
                CommandType::Sub => self.generate_binop(command, Opcode::Sub)?,
                // exponentiation shares the carried multiply
                CommandType::Mul | CommandType::Pov => {
                    self.generate_carried(command, Opcode::Mul, false)?
                }
                CommandType::Div | CommandType::Floor => {
                    self.generate_carried(command, Opcode::Div, false)?
                }
                CommandType::Remain => self.generate_carried(command, Opcode::Div, true)?,
                CommandType::And => self.generate_binop(command, Opcode::And)?,
                CommandType::Or => self.generate_binop(command, Opcode::Or)?,
                CommandType::Not => self.generate_logical_not(command)?,
                CommandType::Eq
                | CommandType::Neq
                | CommandType::Lt
                | CommandType::Lte
                | CommandType::Gt
                | CommandType::Gte => self.generate_comparison(command)?,
                CommandType::BitAnd => self.generate_binop(command, Opcode::And)?,
                CommandType::BitOr => self.generate_binop(command, Opcode::Or)?,
                CommandType::BitXor => self.generate_binop(command, Opcode::Xor)?,
                CommandType::BitNot => self.generate_binop(command, Opcode::Not)?,
                CommandType::BitShl => self.generate_shift(command, Opcode::Shl)?,
                CommandType::BitShr => self.generate_shift(command, Opcode::Shr)?,
                CommandType::Cmp => {
                    let fallback = PseudoRegister::new(FIRST_FREE_REGISTER).ok_or(
                        CompilerError::RegisterOverflow {
                            limit: PseudoRegister::max_order(8).unwrap_or(15),
                        },
                    )?;
                    let instructions = self.cmp_instructions(
                        command.operand_a.as_ref(),
                        command.operand_b.as_ref(),
                        fallback,
                    )?;
                    self.chunks.extend(instructions);
                }
                CommandType::Jmp => self.generate_jump(rep, command, Opcode::Jmp)?,
                CommandType::Je => self.generate_jump(rep, command, Opcode::Je)?,
                CommandType::Jne => self.generate_jump(rep, command, Opcode::Jne)?,
                CommandType::Jz => self.generate_jump(rep, command, Opcode::Jz)?,
                CommandType::Jg => self.generate_jump(rep, command, Opcode::Jg)?,
                CommandType::Jge => self.generate_jump(rep, command, Opcode::Jge)?,
                CommandType::Jl => self.generate_jump(rep, command, Opcode::Jl)?,
                CommandType::Jle => self.generate_jump(rep, command, Opcode::Jle)?,
                CommandType::Convert => self.generate_convert(command)?,
                CommandType::Escalate => self.memory.escalate(),
                CommandType::Deescalate => {
                    // in debug mode the last scope stays allocated so the
                    // epilogue can print every live local
                    if self.debug && index + 1 == total {
                        continue;
                    }
                    let instructions = self.memory.deescalate();
                    self.chunks.extend(instructions);
                }
            }
        }
        if let Some(label) = rep.label_at(total) {
            self.chunks.push(Instruction::Label(label.name.clone()));
        }

        if self.debug {
            self.emit_debug_prints();
            self.chunks.push(Instruction::Call {
                callee: "exit".to_string(),
            });
        } else {
            self.chunks.push(Instruction::mov("rax", "60"));
            self.chunks.push(Instruction::mov("rdi", "0"));
            self.chunks.push(Instruction::Syscall);
        }

        let header = if self.debug { DEBUG_HEADER } else { RELEASE_HEADER };
        let mut out = String::from(header);
        for chunk in &self.chunks {
            out.push_str(&chunk.to_asm());
            out.push('\n');
        }
        if self.debug {
            out.push_str(DEBUG_DATA);
        }
        Ok(out)
    }

    // ---- stores ----

    fn generate_store(&mut self, command: &Command) -> Result<(), CompilerError> {
        let Some(Target::Variable(variable)) = &command.target else {
            return Err(CompilerError::MalformedCommand {
                reason: "STORE without a variable target".to_string(),
            });
        };
        let instructions = match &command.operand_a {
            Some(Operand::Record(literal)) => self.memory.store_record(&variable.name, literal)?,
            Some(Operand::Value(value)) => self
                .memory
                .store_scalar(&variable.name, SourceRef::Value(value.as_str()))?,
            Some(Operand::Register(register)) => self
                .memory
                .store_scalar(&variable.name, SourceRef::Register(register))?,
            Some(Operand::Variable(source)) => self
                .memory
                .store_scalar(&variable.name, SourceRef::Variable(source))?,
            _ => {
                return Err(CompilerError::MalformedCommand {
                    reason: "STORE without a source".to_string(),
                });
            }
        };
        self.chunks.extend(instructions);
        Ok(())
    }

    // ---- arithmetic and logic ----

    fn generate_binop(&mut self, command: &Command, op: Opcode) -> Result<(), CompilerError> {
        let Some(operand_a) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "binary operation without first operand".to_string(),
            });
        };
        let Some(operand_b) = &command.operand_b else {
            return self.generate_unary(command, op);
        };
        let target = Self::target_register(command)?;

        match (operand_a.as_register(), operand_b.as_register()) {
            (Some(register_a), Some(register_b)) => {
                let a = physical(&register_a)?;
                let b = physical(&register_b)?;
                self.chunks.push(Instruction::MathLogic {
                    op,
                    dst: a.to_string(),
                    src: Some(b.to_string()),
                });
            }
            (Some(register_a), None) => {
                let successor = Self::successor(&register_a)?;
                let a = physical(&register_a)?;
                let b = physical(&successor)?;
                let load = self.load(operand_b, b)?;
                self.chunks.push(load);
                self.chunks.push(Instruction::MathLogic {
                    op,
                    dst: a.to_string(),
                    src: Some(b.to_string()),
                });
            }
            (None, Some(register_b)) => {
                // keep left-to-right order: the left operand computes in the
                // successor, the result lands back in the target
                let successor = Self::successor(&register_b)?;
                let a = physical(&successor)?;
                let b = physical(&register_b)?;
                let load = self.load(operand_a, a)?;
                self.chunks.push(load);
                self.chunks.push(Instruction::MathLogic {
                    op,
                    dst: a.to_string(),
                    src: Some(b.to_string()),
                });
                self.chunks
                    .push(Instruction::mov(physical(&target)?, a));
            }
            (None, None) => {
                let successor = Self::successor(&target)?;
                let a = physical(&target)?;
                let b = physical(&successor)?;
                let load_a = self.load(operand_a, a)?;
                let load_b = self.load(operand_b, b)?;
                self.chunks.push(load_a);
                self.chunks.push(load_b);
                self.chunks.push(Instruction::MathLogic {
                    op,
                    dst: a.to_string(),
                    src: Some(b.to_string()),
                });
            }
        }
        Ok(())
    }

    fn generate_unary(&mut self, command: &Command, op: Opcode) -> Result<(), CompilerError> {
        let Some(operand) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "unary operation without operand".to_string(),
            });
        };
        let target = Self::target_register(command)?;
        let register = physical(&target)?;
        if operand.as_register().is_none() {
            let load = self.load(operand, register)?;
            self.chunks.push(load);
        }
        self.chunks.push(Instruction::MathLogic {
            op,
            dst: register.to_string(),
            src: None,
        });
        Ok(())
    }

    // logical negation of a coerced 0/1 value
    fn generate_logical_not(&mut self, command: &Command) -> Result<(), CompilerError> {
        let Some(operand) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "NOT without operand".to_string(),
            });
        };
        let target = Self::target_register(command)?;
        let register = physical(&target)?;
        if operand.as_register().is_none() {
            let load = self.load(operand, register)?;
            self.chunks.push(load);
        }
        self.chunks.push(Instruction::MathLogic {
            op: Opcode::Xor,
            dst: register.to_string(),
            src: Some("1".to_string()),
        });
        Ok(())
    }

    /// mul/div are carried instructions: operands are forced through
    /// rax/rbx, the quotient comes back in rax and the remainder in rdx.
    fn generate_carried(
        &mut self,
        command: &Command,
        op: Opcode,
        remainder: bool,
    ) -> Result<(), CompilerError> {
        let target = Self::target_register(command)?;
        let Some(operand_a) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "carried operation without first operand".to_string(),
            });
        };
        let Some(operand_b) = &command.operand_b else {
            return Err(CompilerError::MalformedCommand {
                reason: "carried operation without second operand".to_string(),
            });
        };
        if op == Opcode::Div {
            self.chunks.push(Instruction::mov("rdx", "0"));
        }
        self.load_carried(operand_a, "rax")?;
        self.load_carried(operand_b, "rbx")?;
        self.chunks.push(Instruction::MathLogic {
            op,
            dst: "rbx".to_string(),
            src: None,
        });
        let result = if remainder { "rdx" } else { "rax" };
        let target_name = physical(&target)?;
        if target_name != result {
            self.chunks.push(Instruction::mov(target_name, result));
        }
        Ok(())
    }

    fn load_carried(&mut self, operand: &Operand, into: &str) -> Result<(), CompilerError> {
        match operand.as_register() {
            Some(register) => {
                let name = physical(&register)?;
                if name != into {
                    self.chunks.push(Instruction::mov(into, name));
                }
            }
            None => {
                let load = self.load(operand, into)?;
                self.chunks.push(load);
            }
        }
        Ok(())
    }

    /// Comparisons materialize their boolean: CMP, then SETcc into cl with
    /// rcx cleared first, then a move into the target register.
    fn generate_comparison(&mut self, command: &Command) -> Result<(), CompilerError> {
        let target = Self::target_register(command)?;
        let instructions = self.cmp_instructions(
            command.operand_a.as_ref(),
            command.operand_b.as_ref(),
            target,
        )?;
        self.chunks.extend(instructions);
        self.emit_setcc(Self::setcc_for(command.operation)?, &target)
    }

    fn generate_convert(&mut self, command: &Command) -> Result<(), CompilerError> {
        let target = Self::target_register(command)?;
        let zero = Operand::Value("0".to_string());
        let instructions =
            self.cmp_instructions(command.operand_a.as_ref(), Some(&zero), target)?;
        self.chunks.extend(instructions);
        // any value above zero counts as true
        self.emit_setcc(Opcode::Setg, &target)
    }

    fn emit_setcc(&mut self, setcc: Opcode, target: &PseudoRegister) -> Result<(), CompilerError> {
        let scratch = physical(&SCRATCH)?;
        self.chunks.push(Instruction::mov(scratch, "0"));
        self.chunks.push(Instruction::MathLogic {
            op: setcc,
            dst: physical(&SCRATCH_LOW)?.to_string(),
            src: None,
        });
        self.chunks
            .push(Instruction::mov(physical(target)?, scratch));
        Ok(())
    }

    fn cmp_instructions(
        &self,
        operand_a: Option<&Operand>,
        operand_b: Option<&Operand>,
        fallback: PseudoRegister,
    ) -> Result<Vec<Instruction>, CompilerError> {
        let Some(operand_a) = operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "CMP without first operand".to_string(),
            });
        };
        let Some(operand_b) = operand_b else {
            return Err(CompilerError::MalformedCommand {
                reason: "CMP without second operand".to_string(),
            });
        };
        let mut instructions = Vec::new();
        let (left, right) = match (operand_a.as_register(), operand_b.as_register()) {
            (Some(register_a), Some(register_b)) => {
                (physical(&register_a)?, physical(&register_b)?)
            }
            (Some(register_a), None) => {
                let successor = Self::successor(&register_a)?;
                let right = physical(&successor)?;
                instructions.push(self.load(operand_b, right)?);
                (physical(&register_a)?, right)
            }
            (None, Some(register_b)) => {
                let successor = Self::successor(&register_b)?;
                let left = physical(&successor)?;
                instructions.push(self.load(operand_a, left)?);
                (left, physical(&register_b)?)
            }
            (None, None) => {
                let successor = Self::successor(&fallback)?;
                let left = physical(&fallback)?;
                let right = physical(&successor)?;
                instructions.push(self.load(operand_a, left)?);
                instructions.push(self.load(operand_b, right)?);
                (left, right)
            }
        };
        instructions.push(Instruction::Cmp {
            left: left.to_string(),
            right: right.to_string(),
        });
        Ok(instructions)
    }

    /// Variable shift counts route through cl; immediates shift directly.
    fn generate_shift(&mut self, command: &Command, op: Opcode) -> Result<(), CompilerError> {
        let target = Self::target_register(command)?;
        let target_name = physical(&target)?;
        let Some(operand_a) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "shift without first operand".to_string(),
            });
        };
        let Some(operand_b) = &command.operand_b else {
            return Err(CompilerError::MalformedCommand {
                reason: "shift without count".to_string(),
            });
        };

        // the count is secured first: when the count sits in the target
        // register, loading the value would clobber it
        let count = match operand_b {
            Operand::Value(value) => value.clone(),
            _ => {
                let scratch = physical(&SCRATCH)?;
                let load = match operand_b.as_register() {
                    Some(register) => Instruction::mov(scratch, physical(&register)?),
                    None => self.load(operand_b, scratch)?,
                };
                self.chunks.push(load);
                physical(&SCRATCH_LOW)?.to_string()
            }
        };
        match operand_a.as_register() {
            Some(register) => {
                let name = physical(&register)?;
                if name != target_name {
                    self.chunks.push(Instruction::mov(target_name, name));
                }
            }
            None => {
                let load = self.load(operand_a, target_name)?;
                self.chunks.push(load);
            }
        }
        self.chunks.push(Instruction::MathLogic {
            op,
            dst: target_name.to_string(),
            src: Some(count),
        });
        Ok(())
    }

    // ---- control flow ----

    fn generate_jump(
        &mut self,
        rep: &Representation,
        command: &Command,
        op: Opcode,
    ) -> Result<(), CompilerError> {
        let Some(Operand::Label(id)) = &command.operand_a else {
            return Err(CompilerError::MalformedCommand {
                reason: "jump without a label operand".to_string(),
            });
        };
        let label = rep.label(*id).ok_or(CompilerError::MalformedCommand {
            reason: "jump to a label missing from the table".to_string(),
        })?;
        if label.position.is_none() {
            return Err(CompilerError::UnplacedLabel {
                name: label.name.clone(),
            });
        }
        self.chunks.push(Instruction::ControlFlow {
            op,
            target: label.name.clone(),
        });
        Ok(())
    }

    // ---- debug epilogue ----

    fn emit_debug_prints(&mut self) {
        let offsets: Vec<usize> = (0..self.memory.regions().len())
            .map(|index| self.memory.region_offset(index))
            .collect();
        for offset in offsets {
            self.chunks.push(Instruction::DataMove {
                op: Opcode::Lea,
                register: "rdi".to_string(),
                data: Some("[formatString]".to_string()),
            });
            self.chunks
                .push(Instruction::mov("rsi", &dereference(offset)));
            self.chunks.push(Instruction::mov("rax", "0"));
            self.chunks.push(Instruction::Call {
                callee: "printf".to_string(),
            });
        }
    }

    // ---- helpers ----

    fn load(&self, operand: &Operand, register: &str) -> Result<Instruction, CompilerError> {
        match operand {
            Operand::Value(value) => Ok(Instruction::mov(register, value)),
            Operand::Variable(variable) => {
                let offset = self.memory.variable_offset(&variable.name)?;
                Ok(Instruction::mov(register, &dereference(offset)))
            }
            _ => Err(CompilerError::MalformedCommand {
                reason: "operand cannot be loaded into a register".to_string(),
            }),
        }
    }

    fn target_register(command: &Command) -> Result<PseudoRegister, CompilerError> {
        match &command.target {
            Some(Target::Register(register)) => Ok(*register),
            _ => Err(CompilerError::MalformedCommand {
                reason: format!("{} requires a register target", command.operation),
            }),
        }
    }

    fn successor(register: &PseudoRegister) -> Result<PseudoRegister, CompilerError> {
        register
            .successor()
            .ok_or(CompilerError::NoSuccessorRegister {
                order: register.order,
            })
    }

    fn setcc_for(operation: CommandType) -> Result<Opcode, CompilerError> {
        match operation {
            CommandType::Eq => Ok(Opcode::Sete),
            CommandType::Neq => Ok(Opcode::Setne),
            CommandType::Gt => Ok(Opcode::Setg),
            CommandType::Gte => Ok(Opcode::Setge),
            CommandType::Lt => Ok(Opcode::Setl),
            CommandType::Lte => Ok(Opcode::Setle),
            _ => Err(CompilerError::MalformedCommand {
                reason: format!("{} has no SETcc form", operation),
            }),
        }
    }
}
