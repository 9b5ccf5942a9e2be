//! Token issuing and password handling.

pub mod issuer;
pub mod password;

pub use issuer::{Claims, IssuedToken, TokenError, TokenIssuer, TokenKind};
