use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project roles, as named in user records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Project Manager")]
    ProjectManager,
    #[serde(rename = "Field Engineer")]
    FieldEngineer,
    #[serde(rename = "Field Person")]
    FieldPerson,
    #[serde(other)]
    Contributor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ProjectManager => "Project Manager",
            Role::FieldEngineer => "Field Engineer",
            Role::FieldPerson => "Field Person",
            Role::Contributor => "Contributor",
        }
    }

    /// Writes anywhere regardless of layer ownership
    pub fn writes_everywhere(&self) -> bool {
        matches!(self, Role::ProjectManager | Role::FieldEngineer)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Role::FieldPerson)
    }

    /// May overwrite a property another owner defines
    pub fn may_override(&self) -> bool {
        matches!(self, Role::ProjectManager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    /// Unknown role names are plain contributors
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Ok(match key.as_str() {
            "projectmanager" | "pm" => Role::ProjectManager,
            "fieldengineer" | "fe" => Role::FieldEngineer,
            "fieldperson" => Role::FieldPerson,
            _ => Role::Contributor,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names() {
        assert_eq!("Project Manager".parse::<Role>(), Ok(Role::ProjectManager));
        assert_eq!("field-engineer".parse::<Role>(), Ok(Role::FieldEngineer));
        assert_eq!("Surveyor".parse::<Role>(), Ok(Role::Contributor));
        assert_eq!(Role::FieldPerson.to_string(), "Field Person");
    }

    #[test]
    fn test_user_json() {
        let user: User = serde_json::from_str(r#"{"name":"ana","role":"Field Engineer"}"#).unwrap();
        assert_eq!(user, User::new("ana", Role::FieldEngineer));

        let other: User = serde_json::from_str(r#"{"name":"bo","role":"Architect"}"#).unwrap();
        assert_eq!(other.role, Role::Contributor);
    }
}
