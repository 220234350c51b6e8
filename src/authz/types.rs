use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::authz::errors::AuthzError;

/// Verb describing what a principal intends to do. `Manage` is the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Manage,
    Create,
    Read,
    Update,
    Delete,
    Approve,
    Review,
    Submit,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Manage,
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Approve,
        Action::Review,
        Action::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Manage => "manage",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Review => "review",
            Action::Submit => "submit",
        }
    }

    /// True if a rule granting `self` covers a request for `requested`.
    pub fn covers(&self, requested: Action) -> bool {
        *self == Action::Manage || *self == requested
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AuthzError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds rules can be written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectTag {
    Student,
    Lecturer,
    Enrollment,
    GuidanceAgenda,
    Submission,
    Feedback,
}

impl SubjectTag {
    pub const ALL: [SubjectTag; 6] = [
        SubjectTag::Student,
        SubjectTag::Lecturer,
        SubjectTag::Enrollment,
        SubjectTag::GuidanceAgenda,
        SubjectTag::Submission,
        SubjectTag::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectTag::Student => "Student",
            SubjectTag::Lecturer => "Lecturer",
            SubjectTag::Enrollment => "Enrollment",
            SubjectTag::GuidanceAgenda => "GuidanceAgenda",
            SubjectTag::Submission => "Submission",
            SubjectTag::Feedback => "Feedback",
        }
    }
}

impl FromStr for SubjectTag {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubjectTag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AuthzError::UnknownSubject(s.to_string()))
    }
}

impl fmt::Display for SubjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a principal. Parsing never fails: names outside the known set become
/// `Other` so they can be registered later or fall through to an empty ability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Guest,
    Student,
    Lecturer,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Guest => "guest",
            Role::Student => "student",
            Role::Lecturer => "lecturer",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "guest" => Role::Guest,
            "student" => Role::Student,
            "lecturer" => Role::Lecturer,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated actor of one request, as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }
}

/// A loaded resource instance: its kind plus the attributes rule conditions read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: SubjectTag,
    #[serde(default)]
    pub attributes: Value,
}

impl Resource {
    pub fn new(kind: SubjectTag, attributes: Value) -> Self {
        Self { kind, attributes }
    }

    /// `id` attribute, if the record carries one. Used for audit messages only.
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }
}

/// What a rule or check is applied to.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Type(SubjectTag),
    Instance(&'a Resource),
}

impl Subject<'_> {
    pub fn tag(&self) -> SubjectTag {
        match self {
            Subject::Type(tag) => *tag,
            Subject::Instance(resource) => resource.kind,
        }
    }
}

impl From<SubjectTag> for Subject<'_> {
    fn from(tag: SubjectTag) -> Self {
        Subject::Type(tag)
    }
}

impl<'a> From<&'a Resource> for Subject<'a> {
    fn from(resource: &'a Resource) -> Self {
        Subject::Instance(resource)
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Absent when the caller could not authenticate the request
    #[serde(default)]
    pub principal: Option<Principal>,
    /// e.g. "enrollments.delete"
    pub operation: String,
    /// The pre-loaded target, for instance-scoped operations
    #[serde(default)]
    pub resource: Option<Resource>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub principal: Principal,
    pub action: String,
    /// e.g. "Enrollment"
    pub subject: String,
    #[serde(default)]
    pub resource: Option<Resource>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AbilitiesRequest {
    pub principal: Principal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_parse() {
        assert_eq!("read".parse::<Action>().unwrap(), Action::Read);
        assert_eq!("manage".parse::<Action>().unwrap(), Action::Manage);
        assert!(matches!(
            "destroy".parse::<Action>(),
            Err(AuthzError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_manage_covers_everything() {
        for action in Action::ALL {
            assert!(Action::Manage.covers(action));
        }
        assert!(Action::Read.covers(Action::Read));
        assert!(!Action::Read.covers(Action::Update));
    }

    #[test]
    fn test_subject_tag_parse() {
        assert_eq!(
            "GuidanceAgenda".parse::<SubjectTag>().unwrap(),
            SubjectTag::GuidanceAgenda
        );
        assert!("guidanceagenda".parse::<SubjectTag>().is_err());
    }

    #[test]
    fn test_role_parse_never_fails() {
        assert_eq!(Role::from("student"), Role::Student);
        assert_eq!(Role::from("lecturer"), Role::Lecturer);
        assert_eq!(Role::from("guest"), Role::Guest);
        assert_eq!(Role::from("dean"), Role::Other("dean".into()));
        assert_eq!(Role::from("dean").to_string(), "dean");
    }

    #[test]
    fn test_principal_serde() {
        let p: Principal = serde_json::from_value(json!({ "id": "S1", "role": "student" })).unwrap();
        assert_eq!(p, Principal::new("S1", Role::Student));
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({ "id": "S1", "role": "student" })
        );
    }

    #[test]
    fn test_subject_tag_of_instance() {
        let r = Resource::new(SubjectTag::Enrollment, json!({ "id": "E1" }));
        assert_eq!(Subject::from(&r).tag(), SubjectTag::Enrollment);
        assert_eq!(Subject::from(SubjectTag::Feedback).tag(), SubjectTag::Feedback);
        assert_eq!(r.id(), Some("E1"));
    }
}
