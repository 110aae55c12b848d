use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn allocation_failure(size: usize, alignment: usize) -> Error {
        Error(ErrorKind::AllocationFailure { size, alignment }.into())
    }

    /// Returns `true` if this error reports a failed allocation.
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::AllocationFailure { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("memory allocation failed: {size} bytes aligned to {alignment}")]
    AllocationFailure { size: usize, alignment: usize },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        let kind = match e.kind() {
            ErrorKind::AllocationFailure { .. } => std::io::ErrorKind::OutOfMemory,
            ErrorKind::InvalidArgument { .. } => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_failure_message() {
        let e = Error::allocation_failure(4096, 32);
        assert!(e.is_allocation_failure());
        assert_eq!(
            e.to_string(),
            "memory allocation failed: 4096 bytes aligned to 32"
        );
    }

    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::allocation_failure(1, 32).into();
        assert_eq!(io.kind(), std::io::ErrorKind::OutOfMemory);

        let io: std::io::Error = Error::invalid_arg("alignment", "too small").into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_into_kind() {
        match Error::invalid_arg("len", "len <= data.len()").into_kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "len");
                assert_eq!(message, "len <= data.len()");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
