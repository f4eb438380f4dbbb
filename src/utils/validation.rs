use crate::utils::error::{Result, SzsError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "file" => Ok(()),
            scheme => Err(SzsError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_one_of(field_name: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Unsupported value. Valid values: {}", allowed.join(", ")),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(SzsError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("extract.output_path", "./out").is_ok());
        assert!(validate_path("extract.output_path", "").is_err());
        assert!(validate_path("extract.output_path", "a\0b").is_err());
    }

    #[test]
    fn test_validate_one_of() {
        assert!(validate_one_of("list.format", "csv", &["text", "csv"]).is_ok());
        assert!(validate_one_of("list.format", "xml", &["text", "csv"]).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("publish.releases_url", "https://repo.example.com/releases/").is_ok());
        assert!(validate_url("publish.releases_url", "file:///srv/maven").is_ok());
        assert!(validate_url("publish.releases_url", "").is_err());
        assert!(validate_url("publish.releases_url", "ftp://repo.example.com").is_err());
        assert!(validate_url("publish.releases_url", "not a url").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("compress.window_size", 4096, 1, 4096).is_ok());
        assert!(validate_range("compress.window_size", 0, 1, 4096).is_err());
        assert!(validate_range("compress.window_size", 5000, 1, 4096).is_err());
    }
}
