use serde::{Deserialize, Serialize};

/// A student's request to be guided by a lecturer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub lecturer_id: String,
    #[serde(default)]
    pub approved: bool,
    pub created_at: i64,
}
