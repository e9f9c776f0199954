//! Concurrency tests for the fill section
//!
//! Many clients search at once; every promoted room must hold exactly the
//! fill target and no client may be seated twice.

use crate::fixtures::{connect_many, create_test_service};
use proptest::prelude::*;
use pvp_lobby::types::ClientPacket;
use pvp_lobby::SearchOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn search_all(fill_target: usize, count: usize) -> (Vec<SearchOutcome>, usize, usize) {
    let lobby = create_test_service(fill_target);
    let clients = connect_many(&lobby, count);

    let handles: Vec<_> = clients
        .iter()
        .map(|test_client| {
            let lobby = Arc::clone(&lobby);
            let client = Arc::clone(&test_client.client);
            tokio::spawn(async move {
                lobby
                    .handle_packet(&client, ClientPacket::FindOpponent)
                    .await
            })
        })
        .collect();

    let outcomes = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            joined
                .expect("search task panicked")
                .expect("search failed")
                .expect("find opponent always yields an outcome")
        })
        .collect();

    let notified = clients
        .iter()
        .filter(|test_client| !test_client.sender.startup_packets().is_empty())
        .count();
    let pending = lobby.matchmaker().pending_member_count().await;

    (outcomes, notified, pending)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_100_concurrent_searches() {
    let concurrent_searches = 100;
    let start_time = Instant::now();

    let (outcomes, notified, pending) = search_all(2, concurrent_searches).await;
    let duration = start_time.elapsed();

    let promoted: Vec<_> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            SearchOutcome::Promoted {
                room_id,
                member_count,
            } => Some((*room_id, *member_count)),
            _ => None,
        })
        .collect();

    assert_eq!(promoted.len(), concurrent_searches / 2);
    assert!(promoted.iter().all(|(_, members)| *members == 2));

    let distinct: HashSet<_> = promoted.iter().map(|(room_id, _)| *room_id).collect();
    assert_eq!(distinct.len(), promoted.len(), "room ids must be unique");

    assert_eq!(notified, concurrent_searches);
    assert_eq!(pending, 0);
    assert!(
        duration < Duration::from_secs(10),
        "100 searches should complete within 10 seconds, took: {:?}",
        duration
    );

    let throughput = concurrent_searches as f64 / duration.as_secs_f64();
    println!(
        "✅ 100 concurrent searches test passed - Throughput: {:.1} searches/sec",
        throughput
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_client_seated_once() {
    let lobby = create_test_service(3);
    let clients = connect_many(&lobby, 30);

    let handles: Vec<_> = clients
        .iter()
        .map(|test_client| {
            let lobby = Arc::clone(&lobby);
            let client = Arc::clone(&test_client.client);
            tokio::spawn(async move {
                lobby
                    .handle_packet(&client, ClientPacket::FindOpponent)
                    .await
            })
        })
        .collect();
    futures::future::join_all(handles).await;

    for test_client in &clients {
        assert_eq!(test_client.sender.startup_packets().len(), 1);
        let room = test_client
            .client
            .current_room()
            .expect("every client should be seated");
        assert!(room.exists_member(test_client.client.id()));
        assert_eq!(room.member_count(), 3);
    }

    println!("✅ Every client seated once test passed");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_rooms_fill_exactly_to_target(fill_target in 2usize..6, count in 0usize..40) {
        let (outcomes, notified, pending) =
            tokio_test::block_on(search_all(fill_target, count));

        let promoted = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, SearchOutcome::Promoted { .. }))
            .count();

        prop_assert_eq!(promoted, count / fill_target);
        prop_assert_eq!(notified, promoted * fill_target);
        prop_assert_eq!(pending, count % fill_target);
        for outcome in &outcomes {
            if let SearchOutcome::Promoted { member_count, .. } = outcome {
                prop_assert_eq!(*member_count, fill_target);
            }
        }
    }
}
