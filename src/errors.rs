//! Error utilities

/// Describes why the apiserver rejected a request
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    AlreadyExists,
    Forbidden,
    /// Catch-all variant. Since this enum is non-exhaustive,
    /// it should be handled with `_` pattern
    Unknown,
}

/// Tries to classify k8s error by its `reason`
pub fn classify(error_reason: &str) -> ErrorClass {
    match error_reason {
        "NotFound" => ErrorClass::NotFound,
        "Conflict" => ErrorClass::Conflict,
        "AlreadyExists" => ErrorClass::AlreadyExists,
        "Forbidden" => ErrorClass::Forbidden,
        _ => ErrorClass::Unknown,
    }
}

/// Tries to classify k8s error, wrapped in kube Error
pub fn classify_kube(error: &kube::Error) -> ErrorClass {
    match error {
        kube::Error::Api(api) => classify(&api.reason),
        _ => ErrorClass::Unknown,
    }
}

/// Turns "not found" responses into data instead of errors.
pub trait NotFoundExt<T> {
    fn found(self) -> Result<Option<T>, kube::Error>;
}

impl<T> NotFoundExt<T> for Result<T, kube::Error> {
    fn found(self) -> Result<Option<T>, kube::Error> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if classify_kube(&err) == ErrorClass::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}
