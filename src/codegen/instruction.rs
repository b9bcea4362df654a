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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Mov,
    Push,
    Pop,
    Lea,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Jmp,
    Je,
    Jne,
    Jz,
    Jg,
    Jge,
    Jl,
    Jle,
    Sete,
    Setne,
    Setg,
    Setge,
    Setl,
    Setle,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Lea => "lea",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Jmp => "jmp",
            Opcode::Je => "je",
            Opcode::Jne => "jne",
            Opcode::Jz => "jz",
            Opcode::Jg => "jg",
            Opcode::Jge => "jge",
            Opcode::Jl => "jl",
            Opcode::Jle => "jle",
            Opcode::Sete => "sete",
            Opcode::Setne => "setne",
            Opcode::Setg => "setg",
            Opcode::Setge => "setge",
            Opcode::Setl => "setl",
            Opcode::Setle => "setle",
        }
    }
}

/// One line of NASM output, shaped by what the operands are rather than by
/// mnemonic. `to_asm` renders the four-space body indent; labels sit flush
/// left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Label(String),
    /// `mov`/`push`/`pop`/`lea` with a register-or-memory first operand.
    DataMove {
        op: Opcode,
        register: String,
        data: Option<String>,
    },
    /// Arithmetic/logic, one or two operands.
    MathLogic {
        op: Opcode,
        dst: String,
        src: Option<String>,
    },
    Cmp {
        left: String,
        right: String,
    },
    /// A jump to a named label.
    ControlFlow {
        op: Opcode,
        target: String,
    },
    Call {
        callee: String,
    },
    Syscall,
}

impl Instruction {
    pub fn mov(register: &str, data: &str) -> Self {
        Instruction::DataMove {
            op: Opcode::Mov,
            register: register.to_string(),
            data: Some(data.to_string()),
        }
    }

    pub fn push(register: &str) -> Self {
        Instruction::DataMove {
            op: Opcode::Push,
            register: register.to_string(),
            data: None,
        }
    }

    pub fn to_asm(&self) -> String {
        match self {
            Instruction::Label(name) => format!("{}:", name),
            Instruction::DataMove { op, register, data } => match data {
                Some(data) => format!("    {} {}, {}", op.mnemonic(), register, data),
                None => format!("    {} {}", op.mnemonic(), register),
            },
            Instruction::MathLogic { op, dst, src } => match src {
                Some(src) => format!("    {} {}, {}", op.mnemonic(), dst, src),
                None => format!("    {} {}", op.mnemonic(), dst),
            },
            Instruction::Cmp { left, right } => format!("    cmp {}, {}", left, right),
            Instruction::ControlFlow { op, target } => {
                format!("    {} {}", op.mnemonic(), target)
            }
            Instruction::Call { callee } => format!("    call {}", callee),
            Instruction::Syscall => "    syscall".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_move_rendering() {
        assert_eq!(Instruction::mov("rax", "1").to_asm(), "    mov rax, 1");
        assert_eq!(Instruction::push("rax").to_asm(), "    push rax");
    }

    #[test]
    fn test_math_logic_rendering() {
        let add = Instruction::MathLogic {
            op: Opcode::Add,
            dst: "r8".to_string(),
            src: Some("r9".to_string()),
        };
        assert_eq!(add.to_asm(), "    add r8, r9");
        let not = Instruction::MathLogic {
            op: Opcode::Not,
            dst: "r8".to_string(),
            src: None,
        };
        assert_eq!(not.to_asm(), "    not r8");
    }

    #[test]
    fn test_label_and_jump_rendering() {
        assert_eq!(
            Instruction::Label("main_if_end_0".to_string()).to_asm(),
            "main_if_end_0:"
        );
        let jump = Instruction::ControlFlow {
            op: Opcode::Jne,
            target: "main_if_0".to_string(),
        };
        assert_eq!(jump.to_asm(), "    jne main_if_0");
    }

    #[test]
    fn test_cmp_and_call_rendering() {
        let cmp = Instruction::Cmp {
            left: "r8".to_string(),
            right: "r9".to_string(),
        };
        assert_eq!(cmp.to_asm(), "    cmp r8, r9");
        let call = Instruction::Call {
            callee: "printf".to_string(),
        };
        assert_eq!(call.to_asm(), "    call printf");
        assert_eq!(Instruction::Syscall.to_asm(), "    syscall");
    }
}
