//! Integration tests for the RCON client against the mock server
//!
//! These tests run both ends over real TCP sockets on localhost.

use rcon_client::{
    ActionState, ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionState, Connector,
    DeferredAction, NetworkAction, ProtocolVariant,
};
use rcon_server::{MockServer, MockServerConfig, MockServerHandle};
use rcon_shared::{decode_bans, decode_players, BanDuration, BanLayout, Origin, Packet, PacketKind, OK};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server(config: MockServerConfig) -> (SocketAddr, MockServerHandle) {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = MockServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    (addr, handle)
}

fn server_config() -> MockServerConfig {
    MockServerConfig::new("127.0.0.1:0")
}

fn client_config(addr: SocketAddr) -> ConnectionConfig {
    let mut config = ConnectionConfig::new(addr.to_string()).with_variant(ProtocolVariant::Frostbite2);
    config.poke_interval = Duration::from_millis(20);
    config
}

async fn connect(config: ConnectionConfig) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = Connector::new(config).subscriber(tx).connect().await.unwrap();
    (handle, rx)
}

/// Waits for the first event matching `predicate`
async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>, mut predicate: F) -> ConnectionEvent
where
    F: FnMut(&ConnectionEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream ended"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn login_moves_connection_to_logged_in() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, mut events) = connect(client_config(addr)).await;

        assert!(connection.login("secret").await.unwrap());
        assert_eq!(connection.state().await.unwrap(), ConnectionState::LoggedIn);

        wait_for(&mut events, |e| {
            matches!(e, ConnectionEvent::StateChanged { to: ConnectionState::LoggedIn, .. })
        })
        .await;

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn wrong_password_stays_connected() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, _events) = connect(client_config(addr)).await;

        assert!(!connection.login("hunter2").await.unwrap());
        assert_eq!(connection.state().await.unwrap(), ConnectionState::Connected);

        let refused = connection.request(["admin.listPlayers", "all"]).await.unwrap();
        assert_eq!(refused.words, vec!["LogInRequired"]);

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn silent_connection_goes_stale() {
        let (addr, server) = start_server(server_config()).await;
        let mut config = client_config(addr);
        config.stale_after = Duration::from_millis(200);
        let (connection, mut events) = connect(config).await;

        assert!(connection.login("secret").await.unwrap());

        let event = wait_for(&mut events, |e| {
            matches!(e, ConnectionEvent::StateChanged { to: ConnectionState::Disconnected, .. })
        })
        .await;
        assert!(matches!(
            event,
            ConnectionEvent::StateChanged { from: ConnectionState::LoggedIn, .. }
        ));

        server.shutdown();
    }

    #[tokio::test]
    async fn server_idle_timeout_is_reported() {
        let (addr, _server) = start_server(MockServerConfig {
            idle_timeout: Duration::ZERO,
            ..server_config()
        })
        .await;
        let (_connection, mut events) = connect(client_config(addr)).await;

        wait_for(&mut events, |e| matches!(e, ConnectionEvent::ConnectionFailure { .. })).await;
        wait_for(&mut events, |e| {
            matches!(e, ConnectionEvent::StateChanged { to: ConnectionState::Disconnected, .. })
        })
        .await;
    }
}

/// REQUEST FLOW TESTS
mod flow_tests {
    use super::*;

    #[tokio::test]
    async fn player_list_decodes_over_the_wire() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, _events) = connect(client_config(addr)).await;
        connection.login("secret").await.unwrap();

        let response = connection.request(["admin.listPlayers", "all"]).await.unwrap();
        assert_eq!(response.words[0], OK);

        let players = decode_players(&response.words[1..]);
        let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Phogue", "Zaeed", "Imisnew2"]);
        assert_eq!(players[0].score, 50);

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn queued_requests_go_out_one_at_a_time_in_order() {
        let (addr, server) = start_server(MockServerConfig {
            response_delay: Duration::from_millis(10),
            ..server_config()
        })
        .await;
        let (connection, mut events) = connect(client_config(addr)).await;

        for _ in 0..5 {
            connection.send(Packet::request(["version"])).await.unwrap();
        }

        let mut sent = Vec::new();
        let mut answered = 0;
        while answered < 5 {
            match wait_for(&mut events, |e| {
                matches!(e, ConnectionEvent::PacketSent(_) | ConnectionEvent::PacketReceived(_))
            })
            .await
            {
                ConnectionEvent::PacketSent(packet) => {
                    // Never more than one unanswered request on the wire
                    assert_eq!(sent.len(), answered);
                    sent.push(packet.sequence());
                }
                ConnectionEvent::PacketReceived(packet) => {
                    assert_eq!(packet.sequence(), sent.last().copied().flatten());
                    answered += 1;
                }
                _ => unreachable!(),
            }
        }

        assert_eq!(sent, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn server_events_are_acknowledged() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, mut events) = connect(client_config(addr)).await;
        connection.login("secret").await.unwrap();
        connection.request(["admin.eventsEnabled", "true"]).await.unwrap();

        server.broadcast_event(["player.onJoin", "Newbie"]);

        let event = wait_for(&mut events, |e| {
            matches!(e, ConnectionEvent::PacketReceived(p) if p.origin == Origin::Server)
        })
        .await;
        let ConnectionEvent::PacketReceived(event) = event else {
            unreachable!()
        };
        assert_eq!(event.words, vec!["player.onJoin", "Newbie"]);

        let ack = wait_for(&mut events, |e| {
            matches!(e, ConnectionEvent::PacketSent(p) if p.origin == Origin::Server)
        })
        .await;
        let ConnectionEvent::PacketSent(ack) = ack else {
            unreachable!()
        };
        assert_eq!(ack.kind, PacketKind::Response);
        assert_eq!(ack.sequence(), event.sequence());
        assert_eq!(ack.words, vec![OK]);

        connection.shutdown().unwrap();
        server.shutdown();
    }
}

/// DEFERRED ACTION TESTS
mod action_tests {
    use super::*;

    #[tokio::test]
    async fn kick_completes_and_leave_event_follows() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, mut events) = connect(client_config(addr)).await;
        connection.login("secret").await.unwrap();
        connection.request(["admin.eventsEnabled", "true"]).await.unwrap();

        let outcome = connection
            .execute(NetworkAction::kick("Zaeed", "AFK").with_player("Imisnew2"), None)
            .await
            .unwrap();

        assert_eq!(outcome.state, ActionState::Done);
        assert_eq!(outcome.requests.len(), 2);
        assert!(outcome.responses.iter().all(Packet::is_ok));

        for name in ["Zaeed", "Imisnew2"] {
            wait_for(&mut events, |e| {
                matches!(e, ConnectionEvent::PacketReceived(p)
                    if p.command() == Some("player.onLeave") && p.words.get(1).map(String::as_str) == Some(name))
            })
            .await;
        }

        let listed = connection.request(["admin.listPlayers", "all"]).await.unwrap();
        assert_eq!(decode_players(&listed.words[1..]).len(), 1);

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn ban_adds_and_saves() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, _events) = connect(client_config(addr)).await;
        connection.login("secret").await.unwrap();

        let outcome = connection
            .execute(NetworkAction::ban("Phogue", BanDuration::Seconds(600), "Cheating"), None)
            .await
            .unwrap();
        assert!(outcome.is_done());
        assert_eq!(outcome.requests.last().and_then(Packet::command), Some("banList.save"));

        let listed = connection.request(["banList.list"]).await.unwrap();
        let bans = decode_bans(&listed.words[1..], ProtocolVariant::Frostbite2.ban_layout());
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].id, "Phogue");
        assert_eq!(bans[0].duration, BanDuration::Seconds(600));
        assert_eq!(bans[0].reason, "Cheating");
        assert_eq!(ProtocolVariant::Frostbite2.ban_layout(), BanLayout::SixWord);

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn map_change_runs_the_chosen_map() {
        let (addr, server) = start_server(server_config()).await;
        let (connection, _events) = connect(client_config(addr)).await;
        connection.login("secret").await.unwrap();

        let outcome = connection
            .execute(NetworkAction::map_change(Some(2)), None)
            .await
            .unwrap();
        assert!(outcome.is_done());

        let indices = connection.request(["mapList.getMapIndices"]).await.unwrap();
        assert_eq!(indices.words, vec![OK, "2", "0"]);

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn dropped_responses_expire_the_action() {
        let (addr, server) = start_server(MockServerConfig {
            drop_rate: 1.0,
            seed: Some(1),
            ..server_config()
        })
        .await;
        let mut config = client_config(addr);
        config.action_timeout = Duration::from_millis(200);
        let (connection, _events) = connect(config).await;

        let outcome = connection
            .execute(NetworkAction::say("anyone there?", vec![]), None)
            .await
            .unwrap();
        assert_eq!(outcome.state, ActionState::Expired);
        assert_eq!(outcome.requests.len(), 1);
        assert!(outcome.responses.is_empty());

        // The expired request no longer blocks the queue
        let second = connection
            .execute(NetworkAction::raw("version"), Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(second.state, ActionState::Expired);
        assert_eq!(second.requests[0].sequence(), Some(2));

        connection.shutdown().unwrap();
        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_expires_in_flight_actions_once() {
        let (addr, server) = start_server(MockServerConfig {
            response_delay: Duration::from_secs(2),
            ..server_config()
        })
        .await;
        let (connection, _events) = connect(client_config(addr)).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (done, expired, always) = (tx.clone(), tx.clone(), tx);
        let deferred = DeferredAction::new(NetworkAction::kick("Phogue", "").with_player("Zaeed"))
            .on_done(move |_, _, _| {
                let _ = done.send("done");
            })
            .on_expired(move |_, _, _| {
                let _ = expired.send("expired");
            })
            .on_always(move |_| {
                let _ = always.send("always");
            });

        connection.action_deferred(deferred).unwrap();
        connection.shutdown().unwrap();

        let mut fired = Vec::new();
        while let Ok(Some(event)) = timeout(WAIT, rx.recv()).await {
            fired.push(event);
        }
        assert_eq!(fired, vec!["expired", "always"]);

        server.shutdown();
    }
}
