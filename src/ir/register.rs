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

/// The first pseudo-register the IR builder may hand out; orders 0-7 are
/// reserved for fixed uses by the code generator.
pub const FIRST_FREE_REGISTER: u8 = 8;

/// Abstract register identifier used in the IR. `size` is the operand width
/// in bytes (1, 2, 3 and 4 address the x86-64 sub-register schema, 8 the
/// full register); the order range depends on the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PseudoRegister {
    pub order: u8,
    pub size: u8,
}

impl PseudoRegister {
    pub fn new(order: u8) -> Option<Self> {
        Self::with_size(order, 8)
    }

    pub fn with_size(order: u8, size: u8) -> Option<Self> {
        if order > Self::max_order(size)? {
            return None;
        }
        Some(PseudoRegister { order, size })
    }

    pub fn max_order(size: u8) -> Option<u8> {
        match size {
            1 | 2 | 3 => Some(3),
            4 => Some(7),
            8 => Some(15),
            _ => None,
        }
    }

    /// The companion register used by codegen for the second operand of a
    /// binary operation.
    pub fn successor(&self) -> Option<Self> {
        Self::with_size(self.order + 1, self.size)
    }

    pub fn narrowed(&self, size: u8) -> Option<Self> {
        Self::with_size(self.order, size)
    }

    /// Logical name (`r8`, `e2`, `l0`, ...); the physical x86-64 name is the
    /// code generator's concern.
    pub fn name(&self) -> String {
        let prefix = match self.size {
            1 => "l",
            2 => "h",
            3 => "x",
            4 => "e",
            _ => "r",
        };
        format!("{}{}", prefix, self.order)
    }
}

impl fmt::Display for PseudoRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
