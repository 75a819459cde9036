use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Signing secrets of one platform. The secondary secret only exists while a
/// rotation is in progress.
#[derive(Clone, Default)]
pub struct WebhookSecrets {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl WebhookSecrets {
    pub fn new(primary: Option<String>, secondary: Option<String>) -> Self {
        Self {
            primary: primary.filter(|s| !s.is_empty()),
            secondary: secondary.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.primary.is_some()
    }

    fn candidates(&self) -> impl Iterator<Item = (SecretSlot, &str)> {
        let primary = self.primary.as_deref().map(|s| (SecretSlot::Primary, s));
        let secondary = self.secondary.as_deref().map(|s| (SecretSlot::Secondary, s));
        primary.into_iter().chain(secondary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSlot {
    Primary,
    Secondary,
}

/// Lowercase hex HMAC-SHA256 of `body` keyed with `secret`.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature` against the HMAC of the exact `body` bytes under each
/// configured secret, primary first. Returns the slot that matched, or `None`
/// when the body, header or secrets are missing or nothing matched.
pub fn verify(body: &[u8], signature: Option<&str>, secrets: &WebhookSecrets) -> Option<SecretSlot> {
    if body.is_empty() {
        return None;
    }
    let provided = signature.map(str::trim).filter(|s| !s.is_empty())?;
    let provided = provided.to_ascii_lowercase();

    for (slot, secret) in secrets.candidates() {
        let expected = sign(body, secret);
        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            return Some(slot);
        }
    }
    None
}
