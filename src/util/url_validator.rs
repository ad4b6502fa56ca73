use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the API base URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain http to a remote host would expose the bearer token.
    #[error("Insecure base URL: HTTPS required (except localhost for development)")]
    Insecure,
    /// Query strings and fragments would be lost when endpoint paths are appended.
    #[error("Base URL must not carry a query or fragment")]
    HasQuery,
}

/// Validates the base URL of the platform API.
///
/// Accepts `https://` anywhere and `http://` only for localhost, so a bearer
/// token is never sent in clear text to a remote host.
///
/// # Examples
///
/// ```
/// use petfeed::util::validate_base_url;
///
/// assert!(validate_base_url("https://api.example.com/v1").is_ok());
/// assert!(validate_base_url("http://localhost:3333").is_ok());
/// assert!(validate_base_url("http://api.example.com").is_err());
/// assert!(validate_base_url("ftp://example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_local_host(&url) {
                return Err(UrlValidationError::Insecure);
            }
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::HasQuery);
    }

    Ok(url)
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(host)) => host == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
