use miette::Diagnostic;
use thiserror::Error;

use crate::authz::errors::AuthzError;

#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(guidance_authz::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(guidance_authz::serde))]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Policy(#[from] AuthzError),

    #[error("Bad listen address `{0}`")]
    #[diagnostic(
        code(guidance_authz::bad_address),
        help("Set server.host to an IP address and server.port to a free port")
    )]
    BadAddress(String),
}
