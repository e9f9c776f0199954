//! End-to-end room lifecycle: search, promotion, bridge hand-off, finish

use crate::fixtures::{connect, connect_many, create_test_service};
use pvp_lobby::types::{ClientPacket, RoomState};
use pvp_lobby::SearchOutcome;

#[tokio::test]
async fn test_pair_is_promoted_and_validated_by_bridge() {
    let lobby = create_test_service(2);
    let bridge = lobby.bridge();
    let clients = connect_many(&lobby, 2);

    let first = lobby
        .handle_packet(&clients[0].client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(first, Some(SearchOutcome::Waiting { member_count: 1 }));
    assert!(clients[0].received_nothing());

    let second = lobby
        .handle_packet(&clients[1].client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    let room_id = match second {
        Some(SearchOutcome::Promoted {
            room_id,
            member_count,
        }) => {
            assert_eq!(member_count, 2);
            room_id
        }
        other => panic!("expected promotion, got {:?}", other),
    };

    for test_client in &clients {
        let info = test_client.startup();
        assert_eq!(info.room_id, room_id);
        assert_eq!(info.bridge_identity, "test-bridge");
        assert_eq!(info.bridge_endpoints.len(), 2);
        assert_eq!(info.member_count, 2);
        assert!(info
            .session_identity
            .starts_with(&test_client.client.id().to_string()));

        assert!(bridge
            .validate_session(room_id, &info.session_identity)
            .await
            .unwrap());
    }

    let startup = bridge.room_startup_info(room_id).await.unwrap();
    assert!(startup.ready);
    assert_eq!(startup.member_count, 2);

    println!("✅ Pair promotion and bridge validation test passed");
}

#[tokio::test]
async fn test_outsider_is_not_validated() {
    let lobby = create_test_service(2);
    let bridge = lobby.bridge();
    let pair = connect_many(&lobby, 2);
    let outsider = connect(&lobby);

    for test_client in &pair {
        lobby
            .handle_packet(&test_client.client, ClientPacket::FindOpponent)
            .await
            .unwrap();
    }
    let room_id = pair[0].startup().room_id;

    let outsider_identity = format!("{}:forged", outsider.client.id());
    assert!(!bridge
        .validate_session(room_id, &outsider_identity)
        .await
        .unwrap());
    assert!(bridge.validate_session(room_id, "garbage").await.is_err());

    println!("✅ Outsider validation test passed");
}

#[tokio::test]
async fn test_cancel_before_opponent_arrives() {
    let lobby = create_test_service(2);
    let matchmaker = lobby.matchmaker();
    let early = connect(&lobby);
    let late = connect(&lobby);

    lobby
        .handle_packet(&early.client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(matchmaker.pending_member_count().await, 1);

    let cancelled = lobby
        .handle_packet(&early.client, ClientPacket::CancelSearch)
        .await
        .unwrap();
    assert_eq!(cancelled, None);
    assert_eq!(matchmaker.pending_member_count().await, 0);
    assert!(early.client.current_room().is_none());

    // The late client starts a fresh room instead of completing the old one
    let outcome = lobby
        .handle_packet(&late.client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(outcome, Some(SearchOutcome::Waiting { member_count: 1 }));
    assert!(early.received_nothing());
    assert!(late.received_nothing());

    println!("✅ Cancel before opponent test passed");
}

#[tokio::test]
async fn test_disconnect_withdraws_waiting_client() {
    let lobby = create_test_service(2);
    let waiting = connect(&lobby);
    let newcomer = connect(&lobby);

    lobby
        .handle_packet(&waiting.client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    lobby
        .on_client_disconnected(Some(&waiting.client))
        .await
        .unwrap();
    assert_eq!(lobby.registry().len(), 1);

    let outcome = lobby
        .handle_packet(&newcomer.client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(outcome, Some(SearchOutcome::Waiting { member_count: 1 }));

    // A disconnect without a handle is ignored
    lobby.on_client_disconnected(None).await.unwrap();

    println!("✅ Disconnect withdrawal test passed");
}

#[tokio::test]
async fn test_finished_room_is_forgotten_and_members_can_search_again() {
    let lobby = create_test_service(2);
    let bridge = lobby.bridge();
    let clients = connect_many(&lobby, 2);

    for test_client in &clients {
        lobby
            .handle_packet(&test_client.client, ClientPacket::FindOpponent)
            .await
            .unwrap();
    }
    let info = clients[0].startup();
    let room = clients[0].client.current_room().expect("client should be seated");
    assert_eq!(room.state(), RoomState::Processing);

    // Searching again while the room is processing changes nothing
    let repeat = lobby
        .handle_packet(&clients[0].client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(repeat, Some(SearchOutcome::AlreadyInRoom));

    assert!(bridge.finish_room(info.room_id, b"result").await.unwrap());
    assert_eq!(room.state(), RoomState::Runned);
    assert!(!bridge
        .validate_session(info.room_id, &info.session_identity)
        .await
        .unwrap());
    assert!(!bridge.room_startup_info(info.room_id).await.unwrap().ready);
    assert!(!bridge.finish_room(info.room_id, b"again").await.unwrap());

    // Members of a finished room are free to search again
    assert!(clients[0].client.current_room().is_none());
    let outcome = lobby
        .handle_packet(&clients[0].client, ClientPacket::FindOpponent)
        .await
        .unwrap();
    assert_eq!(outcome, Some(SearchOutcome::Waiting { member_count: 1 }));

    println!("✅ Finished room lifecycle test passed");
}

#[tokio::test]
async fn test_raw_packets_are_decoded() {
    let lobby = create_test_service(2);
    let test_client = connect(&lobby);

    let outcome = lobby
        .handle_packet_bytes(&test_client.client, br#"{"type":"FindOpponent"}"#)
        .await
        .unwrap();
    assert_eq!(outcome, Some(SearchOutcome::Waiting { member_count: 1 }));

    assert!(lobby
        .handle_packet_bytes(&test_client.client, b"not json")
        .await
        .is_err());

    let snapshot = lobby.snapshot().unwrap();
    assert_eq!(snapshot.connected_clients, 1);
    assert_eq!(snapshot.matchmaker.pending_members, 1);

    println!("✅ Raw packet decoding test passed");
}
