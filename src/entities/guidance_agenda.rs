use serde::{Deserialize, Serialize};

/// A scheduled guidance session between a lecturer and one student.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceAgenda {
    pub id: String,
    pub student_id: String,
    pub lecturer_id: String,
    pub title: String,
    /// Unix seconds
    pub scheduled_at: i64,
    pub location: Option<String>,
}
