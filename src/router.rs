use crate::core::{FundIdentifier, HandlerError};

/// Matches `/<fund>` and returns the fund segment as-is.
pub fn match_fund(path: &str) -> Result<FundIdentifier, HandlerError> {
    path.strip_prefix('/')
        .filter(|segment| !segment.is_empty() && !segment.contains('/'))
        .map(FundIdentifier::from)
        .ok_or_else(HandlerError::missing_fund)
}
