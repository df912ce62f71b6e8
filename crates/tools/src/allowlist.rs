//! Tool allow-lists: which registered tools an agent may see and call.

/// Result of checking a tool name against an allow-list.
#[derive(Debug, Clone, PartialEq)]
pub enum AllowCheck {
    /// Tool is allowed
    Allowed,
    /// Tool is filtered out
    Denied { tool_name: String, reason: String },
}

/// An optional allow-list of tool names.
///
/// Rules:
/// - `Unrestricted` → every registered tool is visible
/// - `Only(names)` → exactly those names; an empty list hides everything
/// - `Only` containing `"*"` → behaves like `Unrestricted`
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolAllowlist {
    #[default]
    Unrestricted,
    Only(Vec<String>),
}

impl ToolAllowlist {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// An allow-list that hides every tool.
    pub fn none() -> Self {
        Self::Only(Vec::new())
    }

    pub fn check(&self, tool_name: &str) -> AllowCheck {
        match self {
            ToolAllowlist::Unrestricted => AllowCheck::Allowed,
            ToolAllowlist::Only(names) if names.iter().any(|n| n == "*") => AllowCheck::Allowed,
            ToolAllowlist::Only(names) if names.iter().any(|n| n == tool_name) => {
                AllowCheck::Allowed
            }
            ToolAllowlist::Only(names) => AllowCheck::Denied {
                tool_name: tool_name.into(),
                reason: format!(
                    "Tool '{}' not in allow-list ({} tools allowed)",
                    tool_name,
                    names.len()
                ),
            },
        }
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        self.check(tool_name) == AllowCheck::Allowed
    }
}
