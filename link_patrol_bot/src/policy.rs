use std::sync::{PoisonError, RwLock};

use url::Url;

use crate::types::Domain;

/// Outcome of checking one URL against the allowed domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Host doesn't contain any allowed domain.
    ForeignHost(Domain),
    /// No host could be parsed out of the URL at all.
    Unparseable,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        *self == Verdict::Allowed
    }
}

/// Decides which links may stay, based on a replaceable list of allowed
/// domain strings.
///
/// A URL is allowed if its host contains any of the allowed strings, so
/// `blndev.com` also lets through `docs.blndev.com`. Unparseable URLs are
/// never allowed.
#[derive(Debug, Default)]
pub struct DomainPolicy {
    allowed: RwLock<Vec<String>>,
}

impl DomainPolicy {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: RwLock::new(normalize_list(allowed)),
        }
    }

    /// Swap the whole allowed list at once.
    pub fn replace(&self, allowed: impl IntoIterator<Item = String>) {
        let allowed = normalize_list(allowed);
        *self.allowed.write().unwrap_or_else(PoisonError::into_inner) = allowed;
    }

    pub fn allowed_domains(&self) -> Vec<String> {
        self.allowed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn evaluate(&self, url: &str) -> Verdict {
        let Some(domain) = Url::parse(url).ok().as_ref().and_then(Domain::from_url) else {
            log::debug!("Could not get a host out of {url}");
            return Verdict::Unparseable;
        };

        let allowed = self.allowed.read().unwrap_or_else(PoisonError::into_inner);

        if allowed.iter().any(|x| domain.as_str().contains(x.as_str())) {
            Verdict::Allowed
        } else {
            Verdict::ForeignHost(domain)
        }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        self.evaluate(url).is_allowed()
    }
}

/// Lowercase, trim, and drop empty entries; an empty string would match every host.
fn normalize_list(allowed: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut list: Vec<String> = allowed
        .into_iter()
        .map(|x| x.trim().to_lowercase())
        .filter(|x| !x.is_empty())
        .collect();
    list.sort();
    list.dedup();
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> DomainPolicy {
        DomainPolicy::new(["blndev.com".to_string()])
    }

    #[test]
    fn allowed_host() {
        let policy = policy();
        assert_eq!(policy.evaluate("https://blndev.com/a"), Verdict::Allowed);
        assert!(policy.is_allowed("http://docs.BLNDEV.com/x?y=1"));
    }

    #[test]
    fn foreign_host() {
        let policy = policy();
        match policy.evaluate("https://evil.example/x") {
            Verdict::ForeignHost(domain) => assert_eq!(domain.as_str(), "evil.example"),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn only_the_host_counts() {
        assert!(!policy().is_allowed("https://evil.example/blndev.com"));
    }

    #[test]
    fn unparseable_is_disallowed() {
        let policy = policy();
        assert_eq!(policy.evaluate("https://[::1"), Verdict::Unparseable);
        assert_eq!(policy.evaluate("not a url"), Verdict::Unparseable);
    }

    #[test]
    fn replacing_the_list() {
        let policy = policy();
        policy.replace(["  Example.ORG ".to_string(), String::new()]);
        assert_eq!(policy.allowed_domains(), vec!["example.org".to_string()]);
        assert!(policy.is_allowed("https://example.org/"));
        assert!(!policy.is_allowed("https://blndev.com/"));
    }

    #[test]
    fn empty_list_allows_nothing() {
        let policy = DomainPolicy::new(Vec::new());
        assert!(!policy.is_allowed("https://blndev.com/"));
    }
}
