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

use crate::errors::CompilerError;
use crate::ir::register::PseudoRegister;

const BYTE_LOW: [&str; 4] = ["al", "bl", "cl", "dl"];
const BYTE_HIGH: [&str; 4] = ["ah", "bh", "ch", "dh"];
const WORD: [&str; 4] = ["ax", "bx", "cx", "dx"];
const DWORD: [&str; 8] = ["eax", "ebx", "ecx", "edx", "esi", "edi", "esp", "ebp"];
const QWORD: [&str; 16] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "rsp", "rbp", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15",
];

/// Deterministic pseudo-to-physical mapping: order selects within the bank
/// the width addresses.
pub fn physical(register: &PseudoRegister) -> Result<&'static str, CompilerError> {
    let order = register.order as usize;
    let name = match register.size {
        1 => BYTE_LOW.get(order),
        2 => BYTE_HIGH.get(order),
        3 => WORD.get(order),
        4 => DWORD.get(order),
        8 => QWORD.get(order),
        _ => None,
    };
    name.copied().ok_or(CompilerError::MalformedCommand {
        reason: format!("no physical register for {}", register.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qword_mapping() {
        assert_eq!(physical(&PseudoRegister::new(0).unwrap()).unwrap(), "rax");
        assert_eq!(physical(&PseudoRegister::new(5).unwrap()).unwrap(), "rdi");
        assert_eq!(physical(&PseudoRegister::new(8).unwrap()).unwrap(), "r8");
        assert_eq!(physical(&PseudoRegister::new(15).unwrap()).unwrap(), "r15");
    }

    #[test]
    fn test_sub_register_mapping() {
        let rcx = PseudoRegister::new(2).unwrap();
        assert_eq!(physical(&rcx.narrowed(1).unwrap()).unwrap(), "cl");
        assert_eq!(physical(&rcx.narrowed(2).unwrap()).unwrap(), "ch");
        assert_eq!(physical(&rcx.narrowed(3).unwrap()).unwrap(), "cx");
        assert_eq!(physical(&rcx.narrowed(4).unwrap()).unwrap(), "ecx");
    }
}
