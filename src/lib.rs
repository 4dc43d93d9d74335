//! Sign in with Apple client secret generation.
//!
//! Apple's token endpoint takes a short-lived ES256 JWT, signed with a `.p8`
//! key from the developer account, in place of a static `client_secret`.

pub mod clock;
pub mod config;
pub mod error;
pub mod inspect;
pub mod secret;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::SecretError;
pub use secret::{generate_secret, issue, load_key, ClientSecret, Claims, SecretParams};
