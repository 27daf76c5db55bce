//! Pure per-field write arbitration.
//!
//! A server may write a field right now iff it is the highest-precedence
//! server *currently advertising* that field. Precedence is per field
//! and per availability, never global: a server can win `poster` while
//! losing `backdrop` on the same title in the same run.

use conflux_model::{FieldGroup, LanguageCode, ServerId, TitleKey};

use crate::availability::FieldAvailabilityIndex;

/// May `server` write `group` for `key` in this run?
pub fn may_write(
    index: &FieldAvailabilityIndex,
    key: &TitleKey,
    group: FieldGroup,
    server: &ServerId,
) -> bool {
    index.availability(key, group).first() == Some(server)
}

/// May `server` write the `lang` caption track for `key` in this run?
pub fn may_write_caption(
    index: &FieldAvailabilityIndex,
    key: &TitleKey,
    lang: &LanguageCode,
    server: &ServerId,
) -> bool {
    index.caption_availability(key, lang).first() == Some(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_model::{ServerDescriptor, ServerSnapshot, TitleAssets};
    use url::Url;

    fn descriptor(id: &str, priority: u32) -> ServerDescriptor {
        ServerDescriptor {
            id: ServerId::from(id),
            priority,
            base_url: Url::parse(&format!("http://{id}.local")).unwrap(),
        }
    }

    fn assets(poster: Option<&str>, backdrop: Option<&str>) -> TitleAssets {
        TitleAssets {
            poster_url: poster.map(str::to_string),
            backdrop_url: backdrop.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn field_wins_are_independent_per_group() {
        let servers = [descriptor("alpha", 1), descriptor("beta", 2)];
        let key = TitleKey::movie("Heat");

        // alpha advertises only the backdrop; beta only the poster.
        let mut alpha = ServerSnapshot::new(ServerId::from("alpha"));
        alpha.insert(key.clone(), assets(None, Some("/b.jpg")));
        let mut beta = ServerSnapshot::new(ServerId::from("beta"));
        beta.insert(key.clone(), assets(Some("/p.jpg"), None));

        let index = FieldAvailabilityIndex::build(&servers, &[alpha, beta]);

        let alpha_id = ServerId::from("alpha");
        let beta_id = ServerId::from("beta");
        assert!(may_write(&index, &key, FieldGroup::Backdrop, &alpha_id));
        assert!(may_write(&index, &key, FieldGroup::Poster, &beta_id));
        assert!(!may_write(&index, &key, FieldGroup::Poster, &alpha_id));
        assert!(!may_write(&index, &key, FieldGroup::Backdrop, &beta_id));
    }

    #[test]
    fn higher_priority_server_blocks_lower_when_both_advertise() {
        let servers = [descriptor("alpha", 1), descriptor("beta", 2)];
        let key = TitleKey::movie("Heat");

        let mut alpha = ServerSnapshot::new(ServerId::from("alpha"));
        alpha.insert(key.clone(), assets(Some("/a.jpg"), None));
        let mut beta = ServerSnapshot::new(ServerId::from("beta"));
        beta.insert(key.clone(), assets(Some("/b.jpg"), None));

        let index = FieldAvailabilityIndex::build(&servers, &[alpha, beta]);

        assert!(may_write(
            &index,
            &key,
            FieldGroup::Poster,
            &ServerId::from("alpha")
        ));
        assert!(!may_write(
            &index,
            &key,
            FieldGroup::Poster,
            &ServerId::from("beta")
        ));
    }
}
