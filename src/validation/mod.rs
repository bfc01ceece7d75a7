//! Local PURL validation. Never touches the network.

use lazy_static::lazy_static;
use purl::GenericPurl;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::common::PurlRequest;
use crate::error::ValidationError;

lazy_static! {
    /// Captures the type component between `pkg:` and the first `/`
    static ref PURL_TYPE_PATTERN: Regex = Regex::new(r"^pkg:/*([^/?#]*)/").unwrap();

    /// Package types registered with the purl-spec
    static ref KNOWN_TYPES: HashSet<&'static str> = [
        "alpm", "apk", "bitbucket", "bitnami", "cargo", "cocoapods", "composer",
        "conan", "conda", "cpan", "cran", "deb", "docker", "gem", "generic",
        "github", "gitlab", "golang", "hackage", "hex", "huggingface", "luarocks",
        "maven", "mlflow", "npm", "nuget", "oci", "pub", "pypi", "qpkg", "rpm",
        "swid", "swift",
    ]
    .into_iter()
    .collect();
}

/// Whether `package_type` is a registered purl-spec type
pub fn is_known_type(package_type: &str) -> bool {
    KNOWN_TYPES.contains(package_type.to_lowercase().as_str())
}

/// A syntactically valid PURL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPurl {
    inner: GenericPurl<String>,
    canonical: String,
}

impl ParsedPurl {
    pub fn package_type(&self) -> &str {
        self.inner.package_type()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.inner.namespace()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.inner.version()
    }

    pub fn subpath(&self) -> Option<&str> {
        self.inner.subpath()
    }

    pub fn qualifier(&self, key: &str) -> Option<&str> {
        self.inner.qualifiers().get(key)
    }

    /// Canonical string form, as sent to the metadata service
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

impl fmt::Display for ParsedPurl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Classifies raw strings as valid or invalid PURLs.
/// In strict mode the type must also be a registered purl-spec type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurlValidator {
    strict: bool,
}

impl PurlValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn validate(&self, request: &PurlRequest) -> Result<ParsedPurl, ValidationError> {
        self.validate_str(&request.raw)
    }

    pub fn validate_str(&self, raw: &str) -> Result<ParsedPurl, ValidationError> {
        check_structure(raw)?;

        let inner = GenericPurl::<String>::from_str(raw)
            .map_err(|e| ValidationError::MalformedPurl(e.to_string()))?;

        let package_type = inner.package_type().as_str();
        if package_type.is_empty() {
            return Err(ValidationError::EmptyType);
        }
        if self.strict && !is_known_type(package_type) {
            return Err(ValidationError::UnknownType(package_type.to_string()));
        }

        let canonical = inner.to_string();
        Ok(ParsedPurl { inner, canonical })
    }

    /// Validate a whole batch in parallel, preserving input order
    pub fn validate_all(
        &self,
        requests: &[PurlRequest],
    ) -> Vec<Result<ParsedPurl, ValidationError>> {
        requests.par_iter().map(|r| self.validate(r)).collect()
    }
}

/// Checks the parser is lenient about: an empty type, an empty version after
/// `@`, and stray `@` in the name segment.
fn check_structure(raw: &str) -> Result<(), ValidationError> {
    if let Some(caps) = PURL_TYPE_PATTERN.captures(raw) {
        if caps.get(1).map_or(true, |m| m.as_str().is_empty()) {
            return Err(ValidationError::EmptyType);
        }
    }

    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    let last_segment = path.rsplit('/').next().unwrap_or(path);

    match last_segment.matches('@').count() {
        0 => Ok(()),
        1 if last_segment.ends_with('@') => Err(ValidationError::MalformedPurl(
            "version separator '@' is not followed by a version".to_string(),
        )),
        1 => Ok(()),
        _ => Err(ValidationError::MalformedPurl(
            "unexpected '@' in name or version".to_string(),
        )),
    }
}
