use serde::{Deserialize, Serialize};

/// Receiver recorded when a call target's type cannot be inferred.
pub const UNRESOLVED_RECEIVER: &str = "<?>";

/// Package name used for compilation units without a package declaration.
pub const DEFAULT_PACKAGE: &str = "(default package)";

/// A single method invocation found in a method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFact {
    /// Invoked method name
    pub method: String,
    /// Simple type name of the receiver (`<?>` when unknown)
    pub receiver: String,
    /// 0-indexed line of the call site
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFact {
    pub name: String,
    pub params: usize,
    /// Lines spanned by the body (0 for abstract/interface methods)
    pub lines: usize,
    pub calls: Vec<CallFact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    PackagePrivate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFact {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub visibility: Visibility,
}

/// Everything the coupling engine knows about one declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFact {
    pub name: String,
    pub package: String,
    pub path: String,
    /// Superclass first, then implemented/extended interfaces
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldFact>,
    pub methods: Vec<MethodFact>,
}

impl ClassFact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: DEFAULT_PACKAGE.to_string(),
            path: String::new(),
            supertypes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// All calls made from any of this class's methods.
    pub fn calls(&self) -> impl Iterator<Item = &CallFact> {
        self.methods.iter().flat_map(|m| m.calls.iter())
    }

    /// Number of calls whose receiver is exactly `class_name`.
    pub fn calls_to(&self, class_name: &str) -> u64 {
        self.calls().filter(|c| c.receiver == class_name).count() as u64
    }
}

/// Result of fact extraction over a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsResult {
    pub files_scanned: usize,
    /// Files that contained syntax errors (still extracted)
    pub parse_errors: usize,
    pub classes: Vec<ClassFact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(receiver: &str) -> CallFact {
        CallFact {
            method: "m".into(),
            receiver: receiver.into(),
            line: 0,
        }
    }

    #[test]
    fn calls_to_counts_across_methods() {
        let mut fact = ClassFact::new("A");
        fact.methods.push(MethodFact {
            name: "one".into(),
            params: 0,
            lines: 1,
            calls: vec![call("B"), call("C")],
        });
        fact.methods.push(MethodFact {
            name: "two".into(),
            params: 1,
            lines: 3,
            calls: vec![call("B")],
        });

        assert_eq!(fact.calls_to("B"), 2);
        assert_eq!(fact.calls_to("C"), 1);
        assert_eq!(fact.calls_to("b"), 0);
    }
}
