//! Classes, subjects, teacher assignments and enrollments
//!
//! Thin CRUD over the backend's academics endpoints. Required fields are
//! checked locally so obviously incomplete forms never reach the network.

use hajiri_common::api::types::{
    AssignTeacherRequest, Class, ClassPayload, ClassSubject, ClassSubjectId, EnrollRequest,
    Enrollment, ListResponse, Subject, SubjectPayload,
};
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Query};

pub const CLASSES_PATH: &str = "/academics/api/classes/";
pub const SUBJECTS_PATH: &str = "/academics/api/subjects/";
pub const CLASS_SUBJECTS_PATH: &str = "/academics/api/class-subject/";
pub const ENROLLMENTS_PATH: &str = "/academics/api/student-class-enrollment/";
pub const ASSIGN_TEACHER_PATH: &str = "/api/admin/assign-teacher/";

fn detail_path(collection: &str, id: impl std::fmt::Display) -> String {
    format!("{}{}/", collection, id)
}

/// Filters understood by the classes list endpoint
#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub semester: Option<i32>,
    pub department: Option<String>,
}

impl ClassFilter {
    fn to_query(&self) -> Query {
        Query::new()
            .with_opt("name__icontains", self.name.as_deref())
            .with_opt("semester", self.semester)
            .with_opt("department", self.department.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubjectFilter {
    pub name: Option<String>,
    pub code: Option<String>,
}

impl SubjectFilter {
    fn to_query(&self) -> Query {
        Query::new()
            .with_opt("name__icontains", self.name.as_deref())
            .with_opt("code__icontains", self.code.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub class_instance: Option<i64>,
    pub subject: Option<i64>,
    pub teacher: Option<i64>,
}

impl AssignmentFilter {
    fn to_query(&self) -> Query {
        Query::new()
            .with_opt("class_instance", self.class_instance)
            .with_opt("subject", self.subject)
            .with_opt("teacher", self.teacher)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub student: Option<i64>,
    pub enrolled_class: Option<i64>,
}

impl EnrollmentFilter {
    fn to_query(&self) -> Query {
        Query::new()
            .with_opt("student", self.student)
            .with_opt("enrolled_class", self.enrolled_class)
    }
}

fn require(value: &str, message: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(message.to_string()));
    }
    Ok(())
}

fn require_id(value: i64, message: &str) -> ClientResult<()> {
    if value <= 0 {
        return Err(ClientError::Validation(message.to_string()));
    }
    Ok(())
}

/// Check a class form before submitting it
pub fn validate_class(payload: &ClassPayload) -> ClientResult<()> {
    const MESSAGE: &str = "Please fill all class fields";
    require(&payload.name, MESSAGE)?;
    require(&payload.department, MESSAGE)?;
    if payload.year <= 0 || payload.semester <= 0 {
        return Err(ClientError::Validation(MESSAGE.to_string()));
    }
    Ok(())
}

pub fn validate_subject(payload: &SubjectPayload) -> ClientResult<()> {
    const MESSAGE: &str = "Please provide subject name and code";
    require(&payload.name, MESSAGE)?;
    require(&payload.code, MESSAGE)
}

/// Academics CRUD service
pub struct AcademicsService {
    api: Arc<ApiClient>,
}

impl AcademicsService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    // ---------- Classes ----------

    pub async fn list_classes(&self, filter: &ClassFilter) -> ClientResult<Vec<Class>> {
        let list: ListResponse<Class> = self.api.get(CLASSES_PATH, &filter.to_query()).await?;
        Ok(list.into_items())
    }

    pub async fn create_class(&self, payload: &ClassPayload) -> ClientResult<Class> {
        validate_class(payload)?;
        let class: Class = self.api.post(CLASSES_PATH, payload).await?;
        tracing::info!(class_id = class.id, name = %class.name, "Class created");
        Ok(class)
    }

    pub async fn update_class(&self, id: i64, payload: &ClassPayload) -> ClientResult<Class> {
        validate_class(payload)?;
        self.api.put(&detail_path(CLASSES_PATH, id), payload).await
    }

    pub async fn delete_class(&self, id: i64) -> ClientResult<()> {
        self.api.delete(&detail_path(CLASSES_PATH, id)).await?;
        tracing::info!(class_id = id, "Class deleted");
        Ok(())
    }

    // ---------- Subjects ----------

    pub async fn list_subjects(&self, filter: &SubjectFilter) -> ClientResult<Vec<Subject>> {
        let list: ListResponse<Subject> = self.api.get(SUBJECTS_PATH, &filter.to_query()).await?;
        Ok(list.into_items())
    }

    pub async fn create_subject(&self, payload: &SubjectPayload) -> ClientResult<Subject> {
        validate_subject(payload)?;
        let subject: Subject = self.api.post(SUBJECTS_PATH, payload).await?;
        tracing::info!(subject_id = subject.id, code = %subject.code, "Subject created");
        Ok(subject)
    }

    pub async fn update_subject(&self, id: i64, payload: &SubjectPayload) -> ClientResult<Subject> {
        validate_subject(payload)?;
        self.api.put(&detail_path(SUBJECTS_PATH, id), payload).await
    }

    pub async fn delete_subject(&self, id: i64) -> ClientResult<()> {
        self.api.delete(&detail_path(SUBJECTS_PATH, id)).await?;
        tracing::info!(subject_id = id, "Subject deleted");
        Ok(())
    }

    // ---------- Teacher assignments ----------

    pub async fn list_assignments(&self, filter: &AssignmentFilter) -> ClientResult<Vec<ClassSubject>> {
        let list: ListResponse<ClassSubject> =
            self.api.get(CLASS_SUBJECTS_PATH, &filter.to_query()).await?;
        Ok(list.into_items())
    }

    pub async fn assign_teacher(&self, request: &AssignTeacherRequest) -> ClientResult<()> {
        const MESSAGE: &str = "Please select a teacher, class, and subject";
        require_id(request.teacher, MESSAGE)?;
        require_id(request.class_instance, MESSAGE)?;
        require_id(request.subject, MESSAGE)?;

        let _: serde_json::Value = self.api.post(ASSIGN_TEACHER_PATH, request).await?;
        tracing::info!(
            teacher = request.teacher,
            class_instance = request.class_instance,
            subject = request.subject,
            "Teacher assigned"
        );
        Ok(())
    }

    pub async fn remove_assignment(&self, id: ClassSubjectId) -> ClientResult<()> {
        self.api.delete(&detail_path(CLASS_SUBJECTS_PATH, id)).await?;
        tracing::info!(class_subject_id = %id, "Assignment removed");
        Ok(())
    }

    // ---------- Enrollments ----------

    pub async fn list_enrollments(&self, filter: &EnrollmentFilter) -> ClientResult<Vec<Enrollment>> {
        let list: ListResponse<Enrollment> =
            self.api.get(ENROLLMENTS_PATH, &filter.to_query()).await?;
        Ok(list.into_items())
    }

    pub async fn enroll(&self, request: &EnrollRequest) -> ClientResult<()> {
        const MESSAGE: &str = "Please select both student and class";
        require_id(request.student, MESSAGE)?;
        require_id(request.enrolled_class, MESSAGE)?;

        let _: serde_json::Value = self.api.post(ENROLLMENTS_PATH, request).await?;
        tracing::info!(
            student = request.student,
            enrolled_class = request.enrolled_class,
            "Student enrolled"
        );
        Ok(())
    }

    pub async fn remove_enrollment(&self, id: i64) -> ClientResult<()> {
        self.api.delete(&detail_path(ENROLLMENTS_PATH, id)).await?;
        tracing::info!(enrollment_id = id, "Enrollment removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_class() {
        let mut payload = ClassPayload {
            name: "BCA 2nd".to_string(),
            year: 2024,
            semester: 2,
            department: "Computer".to_string(),
        };
        assert!(validate_class(&payload).is_ok());

        payload.department = "  ".to_string();
        assert_eq!(
            validate_class(&payload),
            Err(ClientError::Validation("Please fill all class fields".to_string()))
        );
    }

    #[test]
    fn test_validate_subject() {
        let payload = SubjectPayload {
            name: "Database".to_string(),
            code: String::new(),
        };
        assert!(validate_subject(&payload).is_err());
    }

    #[test]
    fn test_filters_map_to_lookup_params() {
        let query = ClassFilter {
            name: Some("bca".to_string()),
            semester: Some(3),
            department: None,
        }
        .to_query();
        let params: Vec<_> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(params, vec![("name__icontains", "bca"), ("semester", "3")]);
    }

    #[test]
    fn test_detail_path() {
        assert_eq!(detail_path(CLASSES_PATH, 4), "/academics/api/classes/4/");
        assert_eq!(
            detail_path(CLASS_SUBJECTS_PATH, ClassSubjectId(9)),
            "/academics/api/class-subject/9/"
        );
    }
}
