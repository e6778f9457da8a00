mod conflict;

use std::fmt;

use thiserror::Error;

pub use conflict::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Device,
    Room,
    DeviceRequest,
    Booking,
    LeaveRequest,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Device => write!(f, "device"),
            EntityKind::Room => write!(f, "meeting room"),
            EntityKind::DeviceRequest => write!(f, "device request"),
            EntityKind::Booking => write!(f, "booking"),
            EntityKind::LeaveRequest => write!(f, "leave request"),
        }
    }
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidTransition,
    InvalidInterval,
    InvalidInput,
    Conflict,
    Internal,
}

#[derive(Error, Debug)]
pub enum OfficeError {
    #[error("unknown error")]
    Unknown,

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("cannot {action} {entity} in state {from}")]
    InvalidTransition {
        entity: EntityKind,
        from: String,
        action: &'static str,
    },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(ConflictInfo),

    #[error("db error: {0}")]
    DbError(sqlx::Error),
}

impl OfficeError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid_transition(
        entity: EntityKind,
        from: impl fmt::Display,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            action,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::InvalidInterval(_) => ErrorKind::InvalidInterval,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::DbError(_) | Self::Unknown => ErrorKind::Internal,
        }
    }
}

impl PartialEq for OfficeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // sqlx errors carry no equality; any two db errors compare equal
            (Self::DbError(_), Self::DbError(_)) => true,
            (Self::Unknown, Self::Unknown) => true,
            (
                Self::NotFound { entity: e1, id: i1 },
                Self::NotFound { entity: e2, id: i2 },
            ) => e1 == e2 && i1 == i2,
            (Self::Forbidden(v1), Self::Forbidden(v2)) => v1 == v2,
            (
                Self::InvalidTransition {
                    entity: e1,
                    from: f1,
                    action: a1,
                },
                Self::InvalidTransition {
                    entity: e2,
                    from: f2,
                    action: a2,
                },
            ) => e1 == e2 && f1 == f2 && a1 == a2,
            (Self::InvalidInterval(v1), Self::InvalidInterval(v2)) => v1 == v2,
            (Self::InvalidInput(v1), Self::InvalidInput(v2)) => v1 == v2,
            (Self::Conflict(v1), Self::Conflict(v2)) => v1 == v2,
            _ => false,
        }
    }
}

impl From<sqlx::Error> for OfficeError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(e) => {
                let conflict = e
                    .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                    .and_then(|err| {
                        let detail = err.detail().unwrap_or_default();
                        match (err.code(), err.schema(), err.table()) {
                            ("23P01", Some("office"), Some("bookings")) => {
                                let info = detail.parse().unwrap_or_else(|_| {
                                    BookingConflictInfo::UnParsed(detail.to_string())
                                });
                                Some(ConflictInfo::Booking(info))
                            }
                            ("23505", Some("office"), Some("device_requests")) => {
                                ConflictInfo::from_active_request_detail(detail)
                            }
                            _ => None,
                        }
                    });

                match conflict {
                    Some(info) => Self::Conflict(info),
                    None => Self::DbError(sqlx::Error::Database(e)),
                }
            }
            _ => Self::DbError(e),
        }
    }
}

impl From<OfficeError> for tonic::Status {
    fn from(e: OfficeError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ErrorKind::NotFound => tonic::Status::not_found(message),
            ErrorKind::Forbidden => tonic::Status::permission_denied(message),
            ErrorKind::InvalidInterval | ErrorKind::InvalidInput => {
                tonic::Status::invalid_argument(message)
            }
            ErrorKind::InvalidTransition => tonic::Status::failed_precondition(message),
            // retryable: the caller may pick another slot or device
            ErrorKind::Conflict => tonic::Status::aborted(message),
            ErrorKind::Internal => tonic::Status::internal(message),
        }
    }
}
