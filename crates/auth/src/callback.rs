use subtle::ConstantTimeEq;

use crate::secret::CallbackSecret;

/// Result of checking a presented credential.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// Guards the completion callback.
///
/// - No IO
/// - No panics
/// - Comparison time does not depend on where the presented bytes differ
#[derive(Debug, Clone)]
pub struct CallbackAuthenticator {
    secret: CallbackSecret,
}

impl CallbackAuthenticator {
    pub fn new(secret: CallbackSecret) -> Self {
        Self { secret }
    }

    pub fn authenticate(&self, presented: &str) -> Verdict {
        let expected = self.secret.as_bytes();
        let presented = presented.as_bytes();

        // `ct_eq` on slices of different length returns false early; only the
        // length leaks, never the content.
        if presented.len() == expected.len() && bool::from(presented.ct_eq(expected)) {
            Verdict::Valid
        } else {
            Verdict::Invalid
        }
    }
}
