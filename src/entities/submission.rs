use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    PendingReview,
    Revision,
    Approved,
}

/// A piece of work a student hands in to their lecturer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub student_id: String,
    pub lecturer_id: String,
    pub title: String,
    pub status: SubmissionStatus,
    pub file_url: Option<String>,
    pub created_at: i64,
}
