//! Admission decisions for mutating requests

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::Method;
use relief_common::net::IpPatternSet;
use thiserror::Error;

use super::denylist::DenySnapshot;
use crate::config::AccessConfig;

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("ip denied")]
    IpDenied,

    #[error("ip not allowed")]
    IpNotAllowed,

    #[error("missing country")]
    CountryMissing,

    #[error("disallowed country")]
    CountryDisallowed { country: String },
}

impl AdmissionError {
    /// Short reason string placed in the 403 body
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::IpDenied => "ip denied",
            AdmissionError::IpNotAllowed => "ip not allowed",
            AdmissionError::CountryMissing => "missing country",
            AdmissionError::CountryDisallowed { .. } => "disallowed country",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(AdmissionError),
}

/// Static admission rules, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_ips: IpPatternSet,
    allowed_countries: HashSet<String>,
    allow_no_country: bool,
}

impl AccessPolicy {
    /// Build from configuration, skipping unparseable IP tokens with a warning
    pub fn from_config(config: &AccessConfig) -> Self {
        let (allowed_ips, rejected) = IpPatternSet::parse_list(&config.allowed_ips.join(","));
        for error in rejected {
            tracing::warn!(error = %error, "Ignoring ALLOWED_IPS entry");
        }

        let allowed_countries = config
            .allowed_countries
            .iter()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();

        Self {
            allowed_ips,
            allowed_countries,
            allow_no_country: config.allow_no_country,
        }
    }

    /// Only POST and PATCH are subject to admission
    pub fn applies_to(method: &Method) -> bool {
        method == Method::POST || method == Method::PATCH
    }

    /// Decide whether a request may proceed
    ///
    /// The deny-set is consulted first and overrides any allow-list match.
    /// An unresolvable address matches neither the deny-set nor the
    /// allow-set.
    pub fn evaluate(
        &self,
        method: &Method,
        ip: Option<IpAddr>,
        country: Option<&str>,
        deny: &DenySnapshot,
    ) -> Decision {
        if !Self::applies_to(method) {
            return Decision::Allow;
        }

        if ip.is_some_and(|ip| deny.contains(ip)) {
            return Decision::Deny(AdmissionError::IpDenied);
        }

        if !self.allowed_ips.is_empty() && !ip.is_some_and(|ip| self.allowed_ips.contains(ip)) {
            return Decision::Deny(AdmissionError::IpNotAllowed);
        }

        if !self.allowed_countries.is_empty() {
            match country.map(str::trim).filter(|c| !c.is_empty()) {
                None if !self.allow_no_country => {
                    return Decision::Deny(AdmissionError::CountryMissing);
                },
                None => {},
                Some(code) => {
                    let code = code.to_ascii_uppercase();
                    if !self.allowed_countries.contains(&code) {
                        return Decision::Deny(AdmissionError::CountryDisallowed { country: code });
                    }
                },
            }
        }

        Decision::Allow
    }
}
