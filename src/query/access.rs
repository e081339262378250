//! Ownership and visibility terms added to every live query.

use std::sync::Arc;

use crate::geo;
use crate::types::{AccessMap, Identity, EVERYBODY};

use super::expr::{Near, Predicate};
use super::statement::OwnershipFlags;

/// Caller and visibility mode a query is evaluated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScope {
    pub identity: Identity,
    pub private: bool,
}

fn term(map: AccessMap, subject: &str) -> Predicate {
    Predicate::Access {
        map,
        subject: subject.to_string(),
    }
}

impl AccessScope {
    /// Records the caller may see at all.
    ///
    /// Private mode admits only the caller's own rows, public mode also
    /// anything owned by `EVERYBODY`. `include_viewer` adds rows shared with
    /// the caller. An anonymous caller owns nothing.
    pub fn visibility(&self, include_viewer: bool) -> Predicate {
        let subject = self.identity.subject_id();
        let mut terms = Vec::new();
        if !self.private {
            terms.push(term(AccessMap::Owner, EVERYBODY));
        }
        if let Some(subject) = subject {
            terms.push(term(AccessMap::Owner, subject));
            if include_viewer {
                terms.push(term(AccessMap::Viewer, subject));
            }
        }
        Predicate::any(terms)
    }

    /// `(visibility) AND (user) [AND modifiers] [AND near]`.
    pub fn compose(
        &self,
        user: Predicate,
        flags: OwnershipFlags,
        near: Option<(geo::GeoPoint, f64)>,
    ) -> Predicate {
        let mut parts = vec![self.visibility(flags.include_viewer), user];
        let owned = match self.identity.subject_id() {
            Some(subject) => term(AccessMap::Owner, subject),
            None => Predicate::Const(false),
        };
        if flags.exclude_owner {
            parts.push(Predicate::Not(Box::new(owned.clone())));
        }
        if flags.include_owner {
            parts.push(owned);
        }
        if let Some((center, radius_km)) = near {
            parts.push(Predicate::Near(Near {
                center,
                radius_km,
                cells: Arc::new(geo::search_cells(center, radius_km)),
            }));
        }
        Predicate::all(parts)
    }
}
