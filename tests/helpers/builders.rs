use guidance_authz::authz::Resource;
use guidance_authz::entities::{
    Enrollment, Entity, Feedback, GuidanceAgenda, Submission, SubmissionRef, SubmissionStatus,
};

/// Builder for test enrollments
pub struct EnrollmentBuilder {
    id: String,
    student_id: String,
    lecturer_id: String,
}

impl EnrollmentBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            student_id: "S1".to_string(),
            lecturer_id: "L1".to_string(),
        }
    }

    pub fn student(mut self, id: &str) -> Self {
        self.student_id = id.to_string();
        self
    }

    pub fn lecturer(mut self, id: &str) -> Self {
        self.lecturer_id = id.to_string();
        self
    }

    pub fn build(self) -> Enrollment {
        Enrollment {
            id: self.id,
            student_id: self.student_id,
            lecturer_id: self.lecturer_id,
            approved: false,
            created_at: 1_700_000_000,
        }
    }

    pub fn resource(self) -> Resource {
        self.build()
            .to_resource()
            .expect("Failed to convert enrollment")
    }
}

/// Builder for test guidance agendas
pub struct AgendaBuilder {
    id: String,
    student_id: String,
    lecturer_id: String,
}

impl AgendaBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            student_id: "S1".to_string(),
            lecturer_id: "L1".to_string(),
        }
    }

    pub fn student(mut self, id: &str) -> Self {
        self.student_id = id.to_string();
        self
    }

    pub fn lecturer(mut self, id: &str) -> Self {
        self.lecturer_id = id.to_string();
        self
    }

    pub fn resource(self) -> Resource {
        GuidanceAgenda {
            id: self.id,
            student_id: self.student_id,
            lecturer_id: self.lecturer_id,
            title: "Chapter 1 review".to_string(),
            scheduled_at: 1_700_100_000,
            location: None,
        }
        .to_resource()
        .expect("Failed to convert agenda")
    }
}

/// Builder for test submissions
pub struct SubmissionBuilder {
    id: String,
    student_id: String,
    lecturer_id: String,
    status: SubmissionStatus,
}

impl SubmissionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            student_id: "S1".to_string(),
            lecturer_id: "L1".to_string(),
            status: SubmissionStatus::Draft,
        }
    }

    pub fn student(mut self, id: &str) -> Self {
        self.student_id = id.to_string();
        self
    }

    pub fn lecturer(mut self, id: &str) -> Self {
        self.lecturer_id = id.to_string();
        self
    }

    pub fn status(mut self, status: SubmissionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Submission {
        Submission {
            id: self.id,
            student_id: self.student_id,
            lecturer_id: self.lecturer_id,
            title: "Thesis proposal".to_string(),
            status: self.status,
            file_url: None,
            created_at: 1_700_000_000,
        }
    }

    pub fn resource(self) -> Resource {
        self.build()
            .to_resource()
            .expect("Failed to convert submission")
    }
}

/// Builder for test feedback on a submission
pub struct FeedbackBuilder {
    id: String,
    submission: SubmissionRef,
}

impl FeedbackBuilder {
    pub fn on(id: &str, submission: &Submission) -> Self {
        Self {
            id: id.to_string(),
            submission: SubmissionRef {
                id: submission.id.clone(),
                student_id: submission.student_id.clone(),
                lecturer_id: submission.lecturer_id.clone(),
            },
        }
    }

    pub fn resource(self) -> Resource {
        Feedback {
            id: self.id,
            submission: self.submission,
            body: "Please expand the methodology section".to_string(),
            created_at: 1_700_000_500,
        }
        .to_resource()
        .expect("Failed to convert feedback")
    }
}
