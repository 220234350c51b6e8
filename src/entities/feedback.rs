use serde::{Deserialize, Serialize};

/// The owners of the submission a feedback entry belongs to. Rules on feedback
/// read `resource.submission.student_id` and `resource.submission.lecturer_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRef {
    pub id: String,
    pub student_id: String,
    pub lecturer_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub submission: SubmissionRef,
    pub body: String,
    pub created_at: i64,
}
