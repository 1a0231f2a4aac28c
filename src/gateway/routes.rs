//! Static route table: path prefix to backend, and whether identity is needed.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Auth,
    Billing,
    Grievance,
}

impl Backend {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Billing => "billing",
            Self::Grievance => "grievance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub prefix: &'static str,
    pub backend: Backend,
    pub access: Access,
}

pub const ROUTES: [Route; 4] = [
    Route {
        prefix: "/api/v1/auth",
        backend: Backend::Auth,
        access: Access::Public,
    },
    Route {
        prefix: "/api/v1/billing",
        backend: Backend::Billing,
        access: Access::Protected,
    },
    Route {
        prefix: "/api/v1/grievance",
        backend: Backend::Grievance,
        access: Access::Protected,
    },
    Route {
        prefix: "/api/v1/user",
        backend: Backend::Auth,
        access: Access::Protected,
    },
];

/// Match `path` on a segment boundary and return the route with the path the
/// backend should see (prefix removed, never empty).
#[must_use]
pub fn resolve(path: &str) -> Option<(Route, &str)> {
    ROUTES.iter().find_map(|route| {
        let rest = path.strip_prefix(route.prefix)?;
        match rest {
            "" => Some((*route, "/")),
            _ if rest.starts_with('/') => Some((*route, rest)),
            _ => None,
        }
    })
}

/// Backend URL for a stripped path; the query string is carried verbatim.
///
/// # Errors
/// Returns an error if the joined string is not a valid URL.
pub fn target_url(base: &Url, path: &str, query: Option<&str>) -> Result<Url, url::ParseError> {
    let mut target = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    Url::parse(&target)
}
