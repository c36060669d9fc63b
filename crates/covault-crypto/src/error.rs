use covault_types::{Address, ErrorClass};
use thiserror::Error;

/// Signature and digest errors.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    #[error("signature does not verify for signer {signer}")]
    InvalidSignature { signer: Address },

    #[error("signer {signer} is not a current owner")]
    UnauthorizedSigner { signer: Address },

    #[error("threshold not met: required exactly {required} signatures, presented {presented}")]
    ThresholdNotMet { required: u32, presented: u32 },

    #[error("signatures are duplicated or not in canonical signer order")]
    DuplicateOrUnordered,

    #[error("digest material could not be serialized: {0}")]
    Material(String),
}

impl CryptoError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidSignature { .. } => ErrorClass::Signature,
            Self::UnauthorizedSigner { .. } => ErrorClass::Authorization,
            Self::ThresholdNotMet { .. } => ErrorClass::Validation,
            Self::DuplicateOrUnordered => ErrorClass::Validation,
            Self::Material(_) => ErrorClass::Validation,
        }
    }
}
