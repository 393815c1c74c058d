//! Unguessable tokens for the confirm and unsubscribe transitions.
//!
//! Tokens are 256 bits drawn from the operating system CSPRNG and encoded as
//! 64 lowercase hex characters, so they are safe to embed in URL paths.

use std::fmt;

use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};

/// Bytes of entropy per token.
pub const TOKEN_BYTES: usize = 32;

/// How many times token generation is retried when the store reports that a
/// freshly issued token is already taken.
pub const MAX_TOKEN_ATTEMPTS: u32 = 3;

/// An opaque credential presented in a confirm or unsubscribe link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for Token {
  fn from(value: String) -> Self { Self(value) }
}

impl AsRef<str> for Token {
  fn as_ref(&self) -> &str { &self.0 }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A source of fresh tokens.
pub trait TokenSource: Send + Sync {
  fn issue(&self) -> Token;
}

/// Issues tokens from [`OsRng`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenIssuer;

impl TokenSource for OsTokenIssuer {
  fn issue(&self) -> Token {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Token(hex::encode(bytes))
  }
}
