//! Error types for the API access layer
//!
//! Every failure that leaves the pipeline is an [`ApiError`]: a normalized
//! kind, its retry eligibility and a localized user-facing message. Raw
//! transport failures are turned into one by [`classify`].

use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

// == Locale ==
/// Language used for user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    /// Parses a locale tag such as `en`, `fr-FR` or `FR`. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next()?.trim().to_ascii_lowercase();
        match primary.as_str() {
            "en" => Some(Locale::En),
            "fr" => Some(Locale::Fr),
            _ => None,
        }
    }
}

// == Error Kind ==
/// Normalized failure category, independent of transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    RateLimited,
    ServerFault,
    Unknown,
}

impl ErrorKind {
    /// Maps an HTTP status code to its kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            s if s >= 500 => ErrorKind::ServerFault,
            _ => ErrorKind::Unknown,
        }
    }

    /// Only transient kinds may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::RateLimited | ErrorKind::ServerFault
        )
    }

    /// Localized message suitable for display to the end user.
    pub fn user_message(self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, ErrorKind::Network) => {
                "Unable to reach the server. Check your connection and try again."
            }
            (Locale::En, ErrorKind::Unauthorized) => "Your session has expired. Please sign in again.",
            (Locale::En, ErrorKind::Forbidden) => "You do not have permission to do that.",
            (Locale::En, ErrorKind::NotFound) => "The requested item could not be found.",
            (Locale::En, ErrorKind::Conflict) => {
                "This item was changed by someone else. Refresh and try again."
            }
            (Locale::En, ErrorKind::Validation) => "Some of the information provided is invalid.",
            (Locale::En, ErrorKind::RateLimited) => {
                "Too many requests. Please wait a moment and try again."
            }
            (Locale::En, ErrorKind::ServerFault) => {
                "The server encountered a problem. Please try again later."
            }
            (Locale::En, ErrorKind::Unknown) => "Something went wrong. Please try again.",

            (Locale::Fr, ErrorKind::Network) => {
                "Impossible de joindre le serveur. Vérifiez votre connexion et réessayez."
            }
            (Locale::Fr, ErrorKind::Unauthorized) => {
                "Votre session a expiré. Veuillez vous reconnecter."
            }
            (Locale::Fr, ErrorKind::Forbidden) => "Vous n'avez pas l'autorisation d'effectuer cette action.",
            (Locale::Fr, ErrorKind::NotFound) => "L'élément demandé est introuvable.",
            (Locale::Fr, ErrorKind::Conflict) => {
                "Cet élément a été modifié entre-temps. Actualisez et réessayez."
            }
            (Locale::Fr, ErrorKind::Validation) => "Certaines informations saisies sont invalides.",
            (Locale::Fr, ErrorKind::RateLimited) => {
                "Trop de requêtes. Patientez un instant puis réessayez."
            }
            (Locale::Fr, ErrorKind::ServerFault) => {
                "Le serveur a rencontré un problème. Réessayez plus tard."
            }
            (Locale::Fr, ErrorKind::Unknown) => "Une erreur est survenue. Veuillez réessayer.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::ServerFault => "server fault",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// == Api Error ==
/// A classified failure as seen by callers of the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} error: {detail}")]
pub struct ApiError {
    /// Normalized category
    pub kind: ErrorKind,
    /// Whether the retry policy may attempt the call again
    pub retryable: bool,
    /// Localized text for the notification surface
    pub user_message: String,
    /// HTTP status, when the backend answered
    pub status: Option<u16>,
    /// Diagnostic detail for logs
    pub detail: String,
}

impl ApiError {
    /// Builds an error of the given kind with its default retry eligibility.
    pub fn new(kind: ErrorKind, locale: Locale, detail: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            user_message: kind.user_message(locale).to_string(),
            status: None,
            detail: detail.into(),
        }
    }

    /// Attaches the HTTP status that produced this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Terminal authorization failure: the session cannot be recovered without signing in.
    pub fn session_expired(locale: Locale, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, locale, detail)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

// == Classification ==
/// Maps a raw transport failure onto the error taxonomy.
///
/// Status boundaries: 400/422 validation, 401 unauthorized, 403 forbidden,
/// 404 not found, 409 conflict, 429 rate limited, >= 500 server fault.
/// No response at all is a network failure; local failures are unknown.
pub fn classify(failure: &TransportError, locale: Locale) -> ApiError {
    match failure {
        TransportError::Status { status, body } => {
            let detail = status_detail(*status, body);
            ApiError::new(ErrorKind::from_status(*status), locale, detail).with_status(*status)
        }
        TransportError::NoResponse(reason) => ApiError::new(ErrorKind::Network, locale, reason.clone()),
        TransportError::Local(reason) => ApiError::new(ErrorKind::Unknown, locale, reason.clone()),
    }
}

fn status_detail(status: u16, body: &serde_json::Value) -> String {
    let message = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str());
    match message {
        Some(message) => format!("HTTP {}: {}", status, message),
        None => format!("HTTP {}", status),
    }
}

// == Storage Error ==
/// Failure of the persistent key-value store backing the credential store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage contents are malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StorageError {
    /// Local failures surface to callers as unknown, non-retryable errors.
    pub fn into_api_error(self, locale: Locale) -> ApiError {
        ApiError::new(ErrorKind::Unknown, locale, self.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_boundaries() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Forbidden);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::ServerFault);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::ServerFault);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn test_only_transient_kinds_are_retryable() {
        let retryable: Vec<ErrorKind> = [
            ErrorKind::Network,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Validation,
            ErrorKind::RateLimited,
            ErrorKind::ServerFault,
            ErrorKind::Unknown,
        ]
        .into_iter()
        .filter(|k| k.is_retryable())
        .collect();

        assert_eq!(
            retryable,
            vec![ErrorKind::Network, ErrorKind::RateLimited, ErrorKind::ServerFault]
        );
    }

    #[test]
    fn test_classify_status_failure() {
        let failure = TransportError::Status {
            status: 409,
            body: json!({"message": "slot already booked"}),
        };
        let err = classify(&failure, Locale::En);

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(err.status, Some(409));
        assert!(!err.retryable);
        assert!(err.detail.contains("slot already booked"));
        assert_eq!(err.user_message, ErrorKind::Conflict.user_message(Locale::En));
    }

    #[test]
    fn test_classify_missing_response_is_network() {
        let err = classify(&TransportError::NoResponse("connection refused".into()), Locale::En);
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.retryable);
        assert_eq!(err.status, None);
    }

    #[test]
    fn test_classify_local_failure_is_unknown() {
        let err = classify(&TransportError::Local("bad header".into()), Locale::Fr);
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!err.retryable);
        assert_eq!(err.user_message, ErrorKind::Unknown.user_message(Locale::Fr));
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!(Locale::parse("en"), Some(Locale::En));
        assert_eq!(Locale::parse("fr-FR"), Some(Locale::Fr));
        assert_eq!(Locale::parse("FR_ca"), Some(Locale::Fr));
        assert_eq!(Locale::parse("de"), None);
    }
}
