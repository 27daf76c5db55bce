//! Field synchronizers, one per semantic field group.
//!
//! Every synchronizer follows the same template: skip when the server's
//! snapshot lacks the group, gate on the arbiter, resolve URLs against
//! the server's base URL, run the group's change test against the
//! current canonical record, build a partial patch of only what
//! changed, strip operator-locked paths, and upsert what remains. A
//! failure in one group is contained to that group of that title.

mod assets;
mod captions;
mod metadata;
mod technical;

pub use assets::sync_url_group;
pub use captions::{caption_order, sync_captions};
pub use metadata::sync_metadata;
pub use technical::sync_technical;

use conflux_model::{LanguageCode, ServerDescriptor, TitleKey};
use url::Url;

use crate::availability::FieldAvailabilityIndex;
use crate::error::{Result, SyncError};
use crate::fetch::FetchClient;
use crate::store::RecordStore;

/// Everything a synchronizer needs for one run, passed as immutable
/// borrows; the availability index in particular is computed once per
/// run and never mutated mid-pass.
pub struct SyncContext<'a> {
    pub server: &'a ServerDescriptor,
    pub index: &'a FieldAvailabilityIndex,
    pub store: &'a dyn RecordStore,
    pub fetch: &'a FetchClient,
    pub primary_language: &'a LanguageCode,
}

impl std::fmt::Debug for SyncContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("server", &self.server.id)
            .field("primary_language", self.primary_language)
            .finish()
    }
}

/// Resolve a possibly relative advertised URL against the server's
/// configured base URL.
pub fn resolve_url(base: &Url, raw: &str, key: &TitleKey) -> Result<String> {
    base.join(raw).map(|u| u.to_string()).map_err(|e| {
        SyncError::Resolution {
            key: key.clone(),
            message: format!("cannot resolve {raw:?}: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_join_against_base() {
        let base = Url::parse("http://alpha.local/media/").unwrap();
        let key = TitleKey::movie("Heat");
        assert_eq!(
            resolve_url(&base, "posters/heat.jpg", &key).unwrap(),
            "http://alpha.local/media/posters/heat.jpg"
        );
        assert_eq!(
            resolve_url(&base, "/posters/heat.jpg", &key).unwrap(),
            "http://alpha.local/posters/heat.jpg"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let base = Url::parse("http://alpha.local/").unwrap();
        let key = TitleKey::movie("Heat");
        assert_eq!(
            resolve_url(&base, "http://cdn.example/p.jpg", &key).unwrap(),
            "http://cdn.example/p.jpg"
        );
    }
}
