//! End-to-end reconciliation runs over an in-process store: priority
//! arbitration, idempotence, operator locks, caption merging, and the
//! read-only audit over the resulting records.

use std::sync::Arc;

use conflux_config::{FetchSettings, RetrySettings, SyncSettings};
use conflux_core::availability::FieldAvailabilityIndex;
use conflux_core::fetch::FetchClient;
use conflux_core::orchestrator::SyncOrchestrator;
use conflux_core::store::{MemoryRecordStore, RecordStore};
use conflux_core::verify::VerificationEngine;
use conflux_model::{
    FieldGroup, FieldPath, LanguageCode, ServerDescriptor, ServerId,
    ServerSnapshot, TitleKey,
};
use serde_json::{Value, json};
use url::Url;

fn descriptor(id: &str, priority: u32) -> ServerDescriptor {
    ServerDescriptor {
        id: ServerId::new(id),
        priority,
        base_url: Url::parse(&format!("http://{id}.local/")).unwrap(),
    }
}

fn snapshot(id: &str, raw: Value) -> ServerSnapshot {
    ServerSnapshot::from_value(ServerId::new(id), &raw).unwrap()
}

fn orchestrator(store: Arc<MemoryRecordStore>) -> SyncOrchestrator {
    orchestrator_with(store, FetchSettings::default())
}

fn orchestrator_with(
    store: Arc<MemoryRecordStore>,
    settings: FetchSettings,
) -> SyncOrchestrator {
    let fetch = FetchClient::new(settings, None).unwrap();
    SyncOrchestrator::new(store, Arc::new(fetch), SyncSettings::default())
}

fn movie_inventory(poster: &str, backdrop: &str) -> Value {
    json!({
        "movies": {
            "Heat": {
                "urls": {
                    "mp4": "heat/video.mp4",
                    "poster": poster,
                    "backdrop": backdrop,
                },
                "dimensions": { "width": 1920, "height": 1080 },
                "length": 10_252.0,
            }
        }
    })
}

#[tokio::test]
async fn second_run_over_unchanged_inventory_writes_nothing() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let snap = snapshot("alpha", movie_inventory("heat/p.jpg", "heat/b.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);

    let first = orch.run(&server, &snap, &index).await.unwrap();
    assert_eq!(first.created_count(), 1);
    assert!(first.fields_written() > 0);
    assert!(first.errors.is_empty());

    let second = orch.run(&server, &snap, &index).await.unwrap();
    assert_eq!(second.created_count(), 0);
    assert_eq!(second.fields_written(), 0);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn higher_priority_value_persists_regardless_of_run_order() {
    for order in [["alpha", "beta"], ["beta", "alpha"]] {
        let store = Arc::new(MemoryRecordStore::new());
        let orch = orchestrator(store.clone());

        let servers =
            vec![descriptor("alpha", 1), descriptor("beta", 2)];
        let snaps = vec![
            snapshot("alpha", movie_inventory("a/p.jpg", "a/b.jpg")),
            snapshot("beta", movie_inventory("b/p.jpg", "b/b.jpg")),
        ];
        let index = FieldAvailabilityIndex::build(&servers, &snaps);

        for id in order {
            let pos = servers.iter().position(|s| s.id.as_str() == id);
            let server = &servers[pos.unwrap()];
            let snap = snaps.iter().find(|s| s.server == server.id);
            orch.run(server, snap.unwrap(), &index).await.unwrap();
        }

        let record = store
            .find_by_key(&TitleKey::movie("Heat"))
            .await
            .unwrap()
            .unwrap();
        let poster = record.fields.poster_url.as_ref().unwrap();
        assert_eq!(poster.value, "http://alpha.local/a/p.jpg");
        assert_eq!(poster.source, ServerId::new("alpha"));
    }
}

#[tokio::test]
async fn later_appearance_of_better_server_overwrites_lower_priority_value() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let alpha = descriptor("alpha", 1);
    let beta = descriptor("beta", 2);
    let beta_snap = snapshot("beta", movie_inventory("b/p.jpg", "b/b.jpg"));

    // Alpha is offline for the first cycle: beta owns every field.
    let solo = FieldAvailabilityIndex::build(
        std::slice::from_ref(&beta),
        std::slice::from_ref(&beta_snap),
    );
    orch.run(&beta, &beta_snap, &solo).await.unwrap();

    let record = store
        .find_by_key(&TitleKey::movie("Heat"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().source,
        ServerId::new("beta")
    );

    // Next cycle alpha is back and advertises the poster too.
    let alpha_snap = snapshot("alpha", movie_inventory("a/p.jpg", "a/b.jpg"));
    let servers = vec![alpha.clone(), beta.clone()];
    let snaps = vec![alpha_snap.clone(), beta_snap.clone()];
    let index = FieldAvailabilityIndex::build(&servers, &snaps);

    // Beta runs first but may no longer write any contested field.
    let beta_report = orch.run(&beta, &beta_snap, &index).await.unwrap();
    assert_eq!(beta_report.fields_written(), 0);

    orch.run(&alpha, &alpha_snap, &index).await.unwrap();
    let record = store
        .find_by_key(&TitleKey::movie("Heat"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().source,
        ServerId::new("alpha")
    );
}

#[tokio::test]
async fn fields_are_arbitrated_independently() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    // Alpha carries only the backdrop, beta only the poster; each
    // wins its own field despite alpha's better rank.
    let servers = vec![descriptor("alpha", 1), descriptor("beta", 2)];
    let snaps = vec![
        snapshot(
            "alpha",
            json!({
                "movies": {
                    "Heat": { "urls": { "backdrop": "a/b.jpg" } }
                }
            }),
        ),
        snapshot(
            "beta",
            json!({
                "movies": {
                    "Heat": { "urls": { "poster": "b/p.jpg" } }
                }
            }),
        ),
    ];
    let index = FieldAvailabilityIndex::build(&servers, &snaps);

    orch.run(&servers[0], &snaps[0], &index).await.unwrap();
    orch.run(&servers[1], &snaps[1], &index).await.unwrap();

    let record = store
        .find_by_key(&TitleKey::movie("Heat"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.fields.backdrop_url.as_ref().unwrap().source,
        ServerId::new("alpha")
    );
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().source,
        ServerId::new("beta")
    );
}

#[tokio::test]
async fn locked_field_is_skipped_while_others_still_update() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let snap = snapshot("alpha", movie_inventory("p1.jpg", "b1.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);
    orch.run(&server, &snap, &index).await.unwrap();

    let key = TitleKey::movie("Heat");
    store.lock_field(&key, FieldPath::PosterUrl).unwrap();

    // Upstream renames both art files; only the unlocked one lands.
    let snap = snapshot("alpha", movie_inventory("p2.jpg", "b2.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);
    orch.run(&server, &snap, &index).await.unwrap();

    let record = store.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().value,
        "http://alpha.local/p1.jpg"
    );
    assert_eq!(
        record.fields.backdrop_url.as_ref().unwrap().value,
        "http://alpha.local/b2.jpg"
    );

    store.unlock_field(&key, FieldPath::PosterUrl).unwrap();
    orch.run(&server, &snap, &index).await.unwrap();
    let record = store.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().value,
        "http://alpha.local/p2.jpg"
    );
}

#[tokio::test]
async fn bootstrap_creates_exactly_one_record_filled_in_the_same_run() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let snap = snapshot(
        "alpha",
        json!({
            "shows": {
                "The Wire": {
                    "urls": { "poster": "wire/p.jpg" },
                    "seasons": {
                        "2": {
                            "urls": {},
                            "episodes": {
                                "5": { "urls": { "mp4": "wire/s02e05.mp4" } }
                            }
                        }
                    }
                }
            }
        }),
    );
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);

    let report = orch.run(&server, &snap, &index).await.unwrap();
    // Show, season, and episode each get exactly one record.
    assert_eq!(report.created_count(), 3);
    assert_eq!(store.record_count(), 3);

    let episode = store
        .find_by_key(&TitleKey::episode("The Wire", 2, 5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(episode.initial_discovery_server, ServerId::new("alpha"));
    assert_eq!(
        episode.fields.video_url.as_ref().unwrap().value,
        "http://alpha.local/wire/s02e05.mp4"
    );

    // A second discovery pass must not mint a second record.
    orch.run(&server, &snap, &index).await.unwrap();
    assert_eq!(store.record_count(), 3);
}

#[tokio::test]
async fn captions_merge_per_language_with_primary_attribution() {
    for order in [["alpha", "beta"], ["beta", "alpha"]] {
        let store = Arc::new(MemoryRecordStore::new());
        let orch = orchestrator(store.clone());

        let servers =
            vec![descriptor("alpha", 1), descriptor("beta", 2)];
        let snaps = vec![
            snapshot(
                "alpha",
                json!({
                    "movies": {
                        "Heat": {
                            "urls": {
                                "subtitles": { "en": "a/en.vtt" }
                            }
                        }
                    }
                }),
            ),
            snapshot(
                "beta",
                json!({
                    "movies": {
                        "Heat": {
                            "urls": {
                                "subtitles": {
                                    "en": "b/en.vtt",
                                    "fr": "b/fr.vtt",
                                    "es": "b/es.vtt",
                                }
                            }
                        }
                    }
                }),
            ),
        ];
        let index = FieldAvailabilityIndex::build(&servers, &snaps);

        for id in order {
            let pos = servers.iter().position(|s| s.id.as_str() == id);
            let server = &servers[pos.unwrap()];
            let snap = snaps.iter().find(|s| s.server == server.id);
            orch.run(server, snap.unwrap(), &index).await.unwrap();
        }

        let record = store
            .find_by_key(&TitleKey::movie("Heat"))
            .await
            .unwrap()
            .unwrap();
        let captions = &record.fields.captions;
        assert_eq!(captions.len(), 3);
        assert_eq!(
            captions[&LanguageCode::new("en")].source,
            ServerId::new("alpha")
        );
        assert_eq!(
            captions[&LanguageCode::new("fr")].source,
            ServerId::new("beta")
        );
        assert_eq!(
            captions[&LanguageCode::new("es")].source,
            ServerId::new("beta")
        );
        // Primary language leads, the rest sort lexicographically.
        assert_eq!(
            record.fields.caption_order,
            vec![
                LanguageCode::new("en"),
                LanguageCode::new("es"),
                LanguageCode::new("fr"),
            ]
        );
        assert_eq!(
            record.fields.caption_source,
            Some(ServerId::new("alpha"))
        );
    }
}

#[tokio::test]
async fn failing_field_group_never_blocks_its_siblings() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator_with(store.clone(), FetchSettings {
        retry: RetrySettings {
            limit: 0,
            ..RetrySettings::default()
        },
        ..FetchSettings::default()
    });

    // A port with nothing listening: the metadata fetch is refused.
    let dead_addr = {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let server = descriptor("alpha", 1);
    let snap = snapshot(
        "alpha",
        json!({
            "movies": {
                "Heat": {
                    "urls": {
                        "metadata": format!("http://{dead_addr}/meta.json"),
                        "poster": "heat/p.jpg",
                        "backdrop": "heat/b.jpg",
                    }
                }
            }
        }),
    );
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);

    let report = orch.run(&server, &snap, &index).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].group, Some(FieldGroup::Metadata));

    // The broken group is recorded; the rest of the title still lands.
    let record = store
        .find_by_key(&TitleKey::movie("Heat"))
        .await
        .unwrap()
        .unwrap();
    assert!(record.fields.metadata.is_none());
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().value,
        "http://alpha.local/heat/p.jpg"
    );
    assert_eq!(
        record.fields.backdrop_url.as_ref().unwrap().value,
        "http://alpha.local/heat/b.jpg"
    );
}

#[tokio::test]
async fn cancelled_run_skips_remaining_titles_but_keeps_committed_writes() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let before = snapshot("alpha", movie_inventory("p1.jpg", "b1.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            before.clone(),
        ]);
    orch.run(&server, &before, &index).await.unwrap();

    // Upstream renames both art files, but the operator pulls the plug
    // before any title is processed.
    let after = snapshot("alpha", movie_inventory("p2.jpg", "b2.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            after.clone(),
        ]);
    let (_stop, rx) = tokio::sync::watch::channel(true);
    let report = orch
        .run_with_cancel(&server, &after, &index, Some(rx))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.fields_written(), 0);

    // Writes committed before the cancellation stay committed.
    let record = store
        .find_by_key(&TitleKey::movie("Heat"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.fields.poster_url.as_ref().unwrap().value,
        "http://alpha.local/p1.jpg"
    );
}

#[tokio::test]
async fn empty_snapshot_aborts_without_touching_the_store() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let snap = ServerSnapshot::new(ServerId::new("alpha"));
    let index = FieldAvailabilityIndex::build(
        std::slice::from_ref(&server),
        std::slice::from_ref(&snap),
    );

    assert!(orch.run(&server, &snap, &index).await.is_err());
    assert_eq!(store.record_count(), 0);
}

#[tokio::test]
async fn audit_reports_upstream_titles_absent_from_the_store() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let server = descriptor("alpha", 1);
    let synced = snapshot("alpha", movie_inventory("p.jpg", "b.jpg"));
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            synced.clone(),
        ]);
    orch.run(&server, &synced, &index).await.unwrap();

    // A later inventory advertises a second movie nothing has synced.
    let mut grown = synced.clone();
    grown.insert(
        TitleKey::movie("Ronin"),
        conflux_model::TitleAssets::default(),
    );

    let verifier = VerificationEngine::new(store.as_ref());
    let report = verifier.audit(&[grown]).await.unwrap();

    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].key, TitleKey::movie("Ronin"));
    assert_eq!(report.missing[0].advertised_by, vec![ServerId::new(
        "alpha"
    )]);
}

#[tokio::test]
async fn audit_flags_episode_gaps_in_synced_seasons() {
    let store = Arc::new(MemoryRecordStore::new());
    let orch = orchestrator(store.clone());

    let episodes = json!({
        "1": { "urls": { "mp4": "e1.mp4" } },
        "2": { "urls": { "mp4": "e2.mp4" } },
        "4": { "urls": { "mp4": "e4.mp4" } },
        "5": { "urls": { "mp4": "e5.mp4" } },
    });
    let server = descriptor("alpha", 1);
    let snap = snapshot(
        "alpha",
        json!({
            "shows": {
                "The Wire": {
                    "urls": {},
                    "seasons": {
                        "2": { "urls": {}, "episodes": episodes }
                    }
                }
            }
        }),
    );
    let index =
        FieldAvailabilityIndex::build(std::slice::from_ref(&server), &[
            snap.clone(),
        ]);
    orch.run(&server, &snap, &index).await.unwrap();

    let verifier = VerificationEngine::new(store.as_ref());
    let report = verifier.audit(&[snap]).await.unwrap();

    assert_eq!(report.episode_gaps.len(), 1);
    let gap = &report.episode_gaps[0];
    assert_eq!(gap.show, "The Wire");
    assert_eq!(gap.season, 2);
    assert_eq!(gap.first_missing, 3);
    assert_eq!(gap.last_missing, 3);
}
