//! Result alias shared by the domain and application layers

use super::error::DomainError;

pub type Result<T> = std::result::Result<T, DomainError>;
