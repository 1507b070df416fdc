//! Domain entities representing tokens and their claims.

pub mod token;


// Re-export commonly used types
pub use token::{
    ClaimSet, ClaimValue, Claims, NumericDate, RefreshTokenRecord, TokenHeader,
    RESERVED_CLAIMS, TOKEN_TYPE,
};
