//! Placeholder expansion for role arguments and environment.
//!
//! `{port}`, `{host}` and `{url}` refer to the role's own negotiated port;
//! `{<role>.port}`, `{<role>.host}` and `{<role>.url}` to an earlier role's.
//! Braces that do not enclose one of these forms are left alone, so JSON or
//! shell snippets pass through untouched.

use lk_protocol::port_models::PortBinding;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("'{{{placeholder}}}' used but the role has no port")]
    NoOwnPort { placeholder: String },

    #[error("'{{{placeholder}}}' refers to role '{role}', which has no resolved port yet")]
    UnknownRole { placeholder: String, role: String },
}

/// Bindings visible while expanding one role.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    own: Option<PortBinding>,
    roles: BTreeMap<String, PortBinding>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `role`'s binding available as `{role.*}` for later roles.
    pub fn insert_role(&mut self, role: impl Into<String>, binding: PortBinding) {
        self.roles.insert(role.into(), binding);
    }

    /// A view for expanding `own`'s role.
    pub fn with_own(&self, own: Option<PortBinding>) -> Self {
        Self {
            own,
            roles: self.roles.clone(),
        }
    }

    /// Expand every placeholder in `input`.
    pub fn render(&self, input: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return Ok(out);
            };
            let key = &after[..close];
            match self.lookup(key)? {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, TemplateError> {
        let (role, field) = match key.rsplit_once('.') {
            Some((role, field)) if is_role_name(role) => (Some(role), field),
            Some(_) => return Ok(None),
            None => (None, key),
        };
        if !matches!(field, "port" | "host" | "url") {
            return Ok(None);
        }

        let binding = match role {
            None => self.own.as_ref().ok_or_else(|| TemplateError::NoOwnPort {
                placeholder: key.to_string(),
            })?,
            Some(role) => self
                .roles
                .get(role)
                .ok_or_else(|| TemplateError::UnknownRole {
                    placeholder: key.to_string(),
                    role: role.to_string(),
                })?,
        };

        Ok(Some(match field {
            "port" => binding.port.to_string(),
            "host" => binding.host.clone(),
            _ => binding.url(),
        }))
    }
}

fn is_role_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
