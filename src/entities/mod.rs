pub mod enrollment;
pub mod feedback;
pub mod guidance_agenda;
pub mod lecturer;
pub mod student;
pub mod submission;

pub use enrollment::Enrollment;
pub use feedback::{Feedback, SubmissionRef};
pub use guidance_agenda::GuidanceAgenda;
pub use lecturer::Lecturer;
pub use student::Student;
pub use submission::{Submission, SubmissionStatus};

use serde::Serialize;

use crate::authz::errors::AuthzError;
use crate::authz::types::{Resource, SubjectTag};

/// A domain record that can be handed to the gate as a loaded resource.
pub trait Entity: Serialize {
    const KIND: SubjectTag;

    fn to_resource(&self) -> Result<Resource, AuthzError> {
        let attributes = serde_json::to_value(self)
            .map_err(|e| AuthzError::MalformedResource(format!("{}: {e}", Self::KIND)))?;
        if !attributes.is_object() {
            return Err(AuthzError::MalformedResource(format!(
                "{} must serialize to a JSON object",
                Self::KIND
            )));
        }
        Ok(Resource::new(Self::KIND, attributes))
    }
}

impl Entity for Student {
    const KIND: SubjectTag = SubjectTag::Student;
}

impl Entity for Lecturer {
    const KIND: SubjectTag = SubjectTag::Lecturer;
}

impl Entity for Enrollment {
    const KIND: SubjectTag = SubjectTag::Enrollment;
}

impl Entity for GuidanceAgenda {
    const KIND: SubjectTag = SubjectTag::GuidanceAgenda;
}

impl Entity for Submission {
    const KIND: SubjectTag = SubjectTag::Submission;
}

impl Entity for Feedback {
    const KIND: SubjectTag = SubjectTag::Feedback;
}
