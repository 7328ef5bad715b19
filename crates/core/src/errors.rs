use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("malformed upstream output: {0}")]
    MalformedOutput(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::InvalidInput(message.into()))
    }

    pub fn product_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "product", id: id.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
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
            Self::NotFound { .. } => "The requested product could not be found.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Detail that is safe to return to callers. Input and lookup errors carry
    /// their own message; everything else falls back to the generic text.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } | Self::NotFound { message, .. } => message.clone(),
            _ => self.user_message().to_owned(),
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
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
            ApplicationError::Domain(DomainError::InvalidInput(message)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(_)) => Self::BadRequest {
                message: "domain validation failed".to_owned(),
                correlation_id,
            },
            not_found @ ApplicationError::NotFound { .. } => {
                Self::NotFound { message: not_found.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::MalformedOutput(message)
            | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn invalid_input_maps_to_bad_request_with_its_message() {
        let interface =
            ApplicationError::invalid_input("productId is required").into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message == "productId is required"
        ));
        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.public_message(), "productId is required");
    }

    #[test]
    fn invariant_violation_hides_detail() {
        let interface = ApplicationError::from(DomainError::InvariantViolation(
            "match score out of range".to_owned(),
        ))
        .into_interface("req-2");

        assert_eq!(interface.public_message(), "domain validation failed");
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn unknown_product_maps_to_not_found() {
        let interface = ApplicationError::product_not_found("p-404").into_interface("req-3");

        assert_eq!(interface.status_code(), 404);
        assert_eq!(interface.correlation_id(), "req-3");
        assert_eq!(interface.public_message(), "product `p-404` was not found");
    }

    #[test]
    fn persistence_and_integration_map_to_service_unavailable() {
        for error in [
            ApplicationError::Persistence("database lock timeout".to_owned()),
            ApplicationError::Integration("gateway returned 502".to_owned()),
        ] {
            let interface = error.into_interface("req-4");
            assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
            assert_eq!(interface.status_code(), 503);
            assert_eq!(
                interface.public_message(),
                "The service is temporarily unavailable. Please retry shortly."
            );
        }
    }

    #[test]
    fn malformed_output_and_configuration_map_to_internal() {
        for error in [
            ApplicationError::MalformedOutput("no JSON array".to_owned()),
            ApplicationError::Configuration("missing api key".to_owned()),
        ] {
            let interface = error.into_interface("req-5");
            assert!(matches!(interface, InterfaceError::Internal { .. }));
            assert_eq!(interface.status_code(), 500);
            assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
        }
    }
}
