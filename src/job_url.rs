//! Job-posting URL validation.

use crate::error::CvAdaptError;
use reqwest::Url;

/// Check that `raw` is an absolute http(s) URL on one of the accepted
/// job-posting sites and return it parsed.
///
/// Surrounding whitespace is ignored. A host matches a domain when it is
/// the domain itself or any subdomain of it (`uk.linkedin.com` matches
/// `linkedin.com`, `notlinkedin.com` does not).
pub fn validate_job_url(raw: &str, allowed_domains: &[String]) -> Result<Url, CvAdaptError> {
    let trimmed = raw.trim();
    let invalid = || CvAdaptError::InvalidJobUrl {
        url: trimmed.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid());
    }
    let url = Url::parse(trimmed).map_err(|_| invalid())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid());
    }
    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .ok_or_else(invalid)?;

    if allowed_domains.iter().any(|d| host_matches(&host, d)) {
        Ok(url)
    } else {
        Err(CvAdaptError::DisallowedJobDomain {
            host,
            allowed: allowed_domains.to_vec(),
        })
    }
}

/// Convenience predicate over [`validate_job_url`].
pub fn is_valid_job_url(raw: &str, allowed_domains: &[String]) -> bool {
    validate_job_url(raw, allowed_domains).is_ok()
}

fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}
