pub mod auth;
pub mod authors;
pub mod books;

use super::error::ApiError;

/// Parse a path id, answering 400 for anything that is not an integer.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::bad_request("Invalid id", Some(format!("`{raw}` is not an integer"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_integers_only() {
        assert_eq!(parse_id("42").ok(), Some(42));
        assert!(parse_id("abc").is_err());
        assert!(parse_id("4.2").is_err());
        assert!(parse_id("").is_err());
    }
}
