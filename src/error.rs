//! Error taxonomy shared by the stores, the managers and the HTTP layer.

use crate::reference::EntityKind;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Field '{field}' is required")]
    EmptyField { field: &'static str },

    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{0}")]
    Validation(String),

    #[error("Referenced {entity} '{id}' does not exist")]
    ReferenceNotFound { entity: EntityKind, id: String },

    #[error("{} not found", .entity.title())]
    NotFound { entity: EntityKind, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification, used for status mapping and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    NotFound,
    Conflict,
    Auth,
    Forbidden,
    Upstream,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Auth => "auth",
            ErrorClass::Forbidden => "forbidden",
            ErrorClass::Upstream => "upstream",
        }
    }
}

impl ServiceError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn reference_not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        ServiceError::ReferenceNotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        ServiceError::InvalidValue {
            field,
            value: value.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::EmptyField { .. }
            | ServiceError::InvalidValue { .. }
            | ServiceError::Validation(_)
            | ServiceError::ReferenceNotFound { .. } => ErrorClass::Validation,
            ServiceError::NotFound { .. } => ErrorClass::NotFound,
            ServiceError::Conflict(_) => ErrorClass::Conflict,
            ServiceError::Unauthorized(_) => ErrorClass::Auth,
            ServiceError::Forbidden(_) => ErrorClass::Forbidden,
            ServiceError::Database(_) | ServiceError::Internal(_) => ErrorClass::Upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = ServiceError::reference_not_found(EntityKind::Artist, "abc");
        assert_eq!(err.to_string(), "Referenced artist 'abc' does not exist");
        assert_eq!(err.class(), ErrorClass::Validation);

        let err = ServiceError::not_found(EntityKind::Album, "abc");
        assert_eq!(err.to_string(), "Album not found");
        assert_eq!(err.class(), ErrorClass::NotFound);

        let err = ServiceError::EmptyField { field: "title" };
        assert_eq!(err.to_string(), "Field 'title' is required");
    }

    #[test]
    fn storage_errors_are_upstream() {
        let err: ServiceError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.class(), ErrorClass::Upstream);
        let err: ServiceError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.class(), ErrorClass::Upstream);
    }
}
