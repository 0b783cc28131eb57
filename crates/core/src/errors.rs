use thiserror::Error;

/// Failure of an external collaborator (catalog, CRM, sender, language model).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {message}")]
    Unavailable { collaborator: String, message: String },
    #[error("{collaborator} returned a malformed payload: {message}")]
    MalformedPayload { collaborator: String, message: String },
    #[error("{0} is disabled")]
    Disabled(String),
}

impl CollaboratorError {
    pub fn unavailable(collaborator: impl Into<String>, message: impl ToString) -> Self {
        Self::Unavailable { collaborator: collaborator.into(), message: message.to_string() }
    }

    pub fn malformed(collaborator: impl Into<String>, message: impl ToString) -> Self {
        Self::MalformedPayload { collaborator: collaborator.into(), message: message.to_string() }
    }

    pub fn collaborator(&self) -> &str {
        match self {
            Self::Unavailable { collaborator, .. } | Self::MalformedPayload { collaborator, .. } => {
                collaborator
            }
            Self::Disabled(collaborator) => collaborator,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "The request could not be verified.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::InvalidInput(message)
            | ApplicationError::Collaborator(CollaboratorError::MalformedPayload {
                message, ..
            }) => Self::BadRequest { message, correlation_id },
            ApplicationError::Verification(message) => Self::Forbidden { message, correlation_id },
            ApplicationError::Collaborator(error) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, CollaboratorError, InterfaceError};

    #[test]
    fn invalid_input_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::InvalidInput("missing From".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn unavailable_collaborator_maps_to_service_unavailable() {
        let interface = ApplicationError::from(CollaboratorError::unavailable(
            "whatsapp",
            "connection reset",
        ))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn verification_error_maps_to_forbidden() {
        let interface =
            ApplicationError::Verification("token mismatch".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing token".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn collaborator_error_names_its_source() {
        let error = CollaboratorError::Disabled("crm".to_owned());
        assert_eq!(error.collaborator(), "crm");
        assert_eq!(error.to_string(), "crm is disabled");
    }
}
