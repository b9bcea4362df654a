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

/// Stable identifier of a label inside one `Representation`. Jump commands
/// store the id, never the label itself, so forward references and label
/// compaction stay cheap rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub usize);

/// A jump target. `position` is the index into the command stream, assigned
/// when the label is placed; jumps may reference a label before that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub position: Option<usize>,
}

impl Label {
    pub fn unplaced(name: &str) -> Self {
        Label {
            name: name.to_string(),
            position: None,
        }
    }
}
