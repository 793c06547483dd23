use std::path::PathBuf;

use gix::ObjectId;

#[derive(Debug)]
pub enum Error {
    Open(Box<gix::open::Error>),
    NotFound,
    ObjectNotFound(ObjectId),
    NotAFile(PathBuf),
    NotADir(PathBuf),
    PathNotRelative(PathBuf),
    DetachedHead,
    Decode(ObjectId),
    Wrapped(WrappedError),
}

// gix error types are large, deeply nested and change between
// releases. Instead of mirroring them discriminant by discriminant,
// anything unexpected gets boxed with a human-readable context.
#[derive(Debug)]
pub struct WrappedError {
    context: String,
    wrapped: Box<dyn std::error::Error + 'static + Sync + Send>,
}

impl std::fmt::Display for WrappedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.wrapped)
    }
}

impl std::error::Error for WrappedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.wrapped.as_ref())
    }
}

pub(crate) fn wrap_err<E>(msg: String, error: E) -> WrappedError
where
    E: std::error::Error + 'static + Sync + Send,
{
    WrappedError {
        context: msg,
        wrapped: Box::new(error),
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Open(e) => write!(f, "{}", e),
            Error::NotFound => write!(f, "not found"),
            Error::ObjectNotFound(oid) => write!(f, "object not found: {}", oid),
            Error::NotAFile(path) => write!(f, "not a file: {:?}", path),
            Error::NotADir(path) => write!(f, "not a dir: {:?}", path),
            Error::PathNotRelative(path) => write!(f, "path is not relative: {:?}", path),
            Error::DetachedHead => write!(f, "repository must have a valid HEAD ref"),
            Error::Decode(id) => write!(f, "failed to decode object {}", id),
            Error::Wrapped(w) => write!(f, "unexpected error: {}", w),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open(e) => Some(e),
            Error::Wrapped(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WrappedError> for Error {
    fn from(value: WrappedError) -> Self {
        Error::Wrapped(value)
    }
}

impl From<gix::open::Error> for Error {
    fn from(value: gix::open::Error) -> Self {
        Error::Open(Box::new(value))
    }
}
