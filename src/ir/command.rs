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

use std::fmt;

use crate::ir::label::LabelId;
use crate::ir::record::RecordLiteral;
use crate::ir::register::PseudoRegister;
use crate::ir::variable::{VarType, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Store,
    // arithmetic
    Sum,
    Sub,
    Mul,
    Pov,
    Div,
    Floor,
    Remain,
    // logical
    And,
    Or,
    Not,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    // bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    BitShl,
    BitShr,
    // control
    Cmp,
    Jmp,
    Je,
    Jne,
    Jz,
    Jg,
    Jge,
    Jl,
    Jle,
    // type conversion
    Convert,
    // scope markers
    Escalate,
    Deescalate,
}

impl CommandType {
    /// Every command carries a target except the compare/jump family and the
    /// scope markers.
    pub fn requires_target(&self) -> bool {
        !matches!(
            self,
            CommandType::Cmp
                | CommandType::Jmp
                | CommandType::Je
                | CommandType::Jne
                | CommandType::Jz
                | CommandType::Jg
                | CommandType::Jge
                | CommandType::Jl
                | CommandType::Jle
                | CommandType::Escalate
                | CommandType::Deescalate
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            CommandType::Eq
                | CommandType::Neq
                | CommandType::Lt
                | CommandType::Lte
                | CommandType::Gt
                | CommandType::Gte
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, CommandType::And | CommandType::Or | CommandType::Not)
    }

    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            CommandType::Jmp
                | CommandType::Je
                | CommandType::Jne
                | CommandType::Jz
                | CommandType::Jg
                | CommandType::Jge
                | CommandType::Jl
                | CommandType::Jle
        )
    }

    /// Result type of the operation when it produces one: INT for
    /// arithmetic and bitwise commands, BOOL for comparisons and logic.
    pub fn result_type(&self) -> Option<VarType> {
        match self {
            CommandType::Sum
            | CommandType::Sub
            | CommandType::Mul
            | CommandType::Pov
            | CommandType::Div
            | CommandType::Floor
            | CommandType::Remain
            | CommandType::BitAnd
            | CommandType::BitOr
            | CommandType::BitXor
            | CommandType::BitNot
            | CommandType::BitShl
            | CommandType::BitShr => Some(VarType::Int),
            CommandType::And
            | CommandType::Or
            | CommandType::Not
            | CommandType::Eq
            | CommandType::Neq
            | CommandType::Lt
            | CommandType::Lte
            | CommandType::Gt
            | CommandType::Gte => Some(VarType::Bool),
            _ => None,
        }
    }

    /// The conditional jump that *skips* a branch guarded by this condition
    /// (the jump sense is the inverse of the comparison).
    pub fn negated_jump(&self) -> Option<CommandType> {
        match self {
            CommandType::And | CommandType::Or | CommandType::Not | CommandType::Eq => {
                Some(CommandType::Jne)
            }
            CommandType::Neq => Some(CommandType::Je),
            CommandType::Lt => Some(CommandType::Jge),
            CommandType::Lte => Some(CommandType::Jg),
            CommandType::Gt => Some(CommandType::Jle),
            CommandType::Gte => Some(CommandType::Jl),
            _ => None,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandType::Store => "STORE",
            CommandType::Sum => "SUM",
            CommandType::Sub => "SUB",
            CommandType::Mul => "MUL",
            CommandType::Pov => "POV",
            CommandType::Div => "DIV",
            CommandType::Floor => "FLOOR",
            CommandType::Remain => "REMAIN",
            CommandType::And => "AND",
            CommandType::Or => "OR",
            CommandType::Not => "NOT",
            CommandType::Eq => "EQ",
            CommandType::Neq => "NEQ",
            CommandType::Lt => "LT",
            CommandType::Lte => "LTE",
            CommandType::Gt => "GT",
            CommandType::Gte => "GTE",
            CommandType::BitAnd => "BIT_AND",
            CommandType::BitOr => "BIT_OR",
            CommandType::BitXor => "BIT_XOR",
            CommandType::BitNot => "BIT_NOT",
            CommandType::BitShl => "BIT_SHL",
            CommandType::BitShr => "BIT_SHR",
            CommandType::Cmp => "CMP",
            CommandType::Jmp => "JMP",
            CommandType::Je => "JE",
            CommandType::Jne => "JNE",
            CommandType::Jz => "JZ",
            CommandType::Jg => "JG",
            CommandType::Jge => "JGE",
            CommandType::Jl => "JL",
            CommandType::Jle => "JLE",
            CommandType::Convert => "CONVERT",
            CommandType::Escalate => "ESCALATE",
            CommandType::Deescalate => "DEESCALATE",
        };
        f.write_str(name)
    }
}

/// Anything a command can read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Value(String),
    Register(PseudoRegister),
    Variable(Variable),
    Label(LabelId),
    Record(RecordLiteral),
    Type(VarType),
}

impl Operand {
    pub fn as_register(&self) -> Option<PseudoRegister> {
        match self {
            Operand::Register(register) => Some(*register),
            _ => None,
        }
    }
}

/// Anything a command can write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Register(PseudoRegister),
    Variable(Variable),
}

/// One three-address-code instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub operation: CommandType,
    pub target: Option<Target>,
    pub operand_a: Option<Operand>,
    pub operand_b: Option<Operand>,
}

impl Command {
    pub fn new(
        operation: CommandType,
        target: Option<Target>,
        operand_a: Option<Operand>,
        operand_b: Option<Operand>,
    ) -> Self {
        Command {
            operation,
            target,
            operand_a,
            operand_b,
        }
    }

    pub fn store(target: Variable, source: Operand) -> Self {
        Command::new(
            CommandType::Store,
            Some(Target::Variable(target)),
            Some(source),
            None,
        )
    }

    pub fn cmp(operand_a: Operand, operand_b: Operand) -> Self {
        Command::new(CommandType::Cmp, None, Some(operand_a), Some(operand_b))
    }

    pub fn jump(operation: CommandType, label: LabelId) -> Self {
        Command::new(operation, None, Some(Operand::Label(label)), None)
    }

    pub fn escalate() -> Self {
        Command::new(CommandType::Escalate, None, None, None)
    }

    pub fn deescalate() -> Self {
        Command::new(CommandType::Deescalate, None, None, None)
    }
}
