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

use crate::ir::variable::{VarType, Variable};

/// A named lexical region of the command stream with its own variable table.
/// `begin` and `end` are command indices; `end` stays `None` while the scope
/// is still open during IR building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: String,
    pub begin: usize,
    pub end: Option<usize>,
    variables: Vec<Variable>,
}

impl Scope {
    pub fn new(name: &str, begin: usize) -> Self {
        Scope {
            name: name.to_string(),
            begin,
            end: None,
            variables: Vec::new(),
        }
    }

    pub fn register_var(
        &mut self,
        name: &str,
        value: Option<String>,
        var_type: VarType,
    ) -> Variable {
        let variable = Variable::new(name, value, var_type);
        match self.variables.iter_mut().find(|v| v.name == name) {
            Some(existing) => *existing = variable.clone(),
            None => self.variables.push(variable.clone()),
        }
        variable
    }

    pub fn get_var(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn contains(&self, command_index: usize) -> bool {
        match self.end {
            Some(end) => self.begin <= command_index && command_index <= end,
            None => self.begin <= command_index,
        }
    }

    pub fn pprint_vars(&self) -> String {
        let mut header = format!("scope {} variables:\n", self.name);
        for variable in &self.variables {
            header.push_str(&format!("    {}\n", variable));
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut scope = Scope::new("main", 0);
        scope.register_var("x", Some("1".to_string()), VarType::Int);
        assert!(scope.get_var("x").is_some());
        assert!(scope.get_var("y").is_none());
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut scope = Scope::new("main", 0);
        scope.register_var("x", None, VarType::Int);
        scope.register_var("x", None, VarType::Bool);
        assert_eq!(scope.variables().len(), 1);
        assert_eq!(scope.get_var("x").unwrap().var_type, VarType::Bool);
    }

    #[test]
    fn test_contains() {
        let mut scope = Scope::new("main", 2);
        assert!(scope.contains(5));
        assert!(!scope.contains(1));
        scope.end = Some(4);
        assert!(scope.contains(4));
        assert!(!scope.contains(5));
    }
}
