use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chathub::directory::Directory;
use chathub::message::{ChatMessage, ClientEvent, MessageKind, Sender, ServerEvent};
use chathub::server::{routes, Server};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let (addr, serving) =
        warp::serve(routes(Directory::seeded(), Server::new())).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(serving);
    addr
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    ws
}

fn sender(name: &str) -> Sender {
    Sender {
        id: name.to_string(),
        username: name.to_string(),
        avatar: format!("assets/avatars/{name}.png"),
    }
}

async fn emit(ws: &mut Ws, event: &ClientEvent) {
    let text = serde_json::to_string(event).expect("serialize event");
    ws.send(Message::text(text)).await.expect("send frame");
}

/// Joins and gives the server a beat to register the subscription, since
/// joins are unacknowledged by design.
async fn join(ws: &mut Ws, who: &Sender, room: &str) {
    emit(ws, &ClientEvent::JoinRoom(ChatMessage::joined(who, room))).await;
    sleep(Duration::from_millis(250)).await;
}

async fn recv_msg(ws: &mut Ws) -> ChatMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            let ServerEvent::ReceiveMsg(msg) =
                serde_json::from_str(text.as_str()).expect("server event");
            return msg;
        }
    }
}

async fn assert_silent(ws: &mut Ws) {
    let quiet = timeout(Duration::from_millis(400), ws.next()).await;
    assert!(quiet.is_err(), "expected no further events, got {quiet:?}");
}

#[tokio::test]
async fn two_member_room_scenario() {
    let addr = start_server().await;

    let ada = sender("ada");
    let bob = sender("bob");

    let mut a = connect(addr).await;
    join(&mut a, &ada, "generalmain").await;

    let mut b = connect(addr).await;
    join(&mut b, &bob, "generalmain").await;

    let arrival = recv_msg(&mut a).await;
    assert_eq!(arrival.content, "UPDATE: bob joined the channel");
    assert_eq!(arrival.kind, MessageKind::Status);
    assert_eq!(arrival.username, "bob");

    emit(
        &mut b,
        &ClientEvent::Message(ChatMessage::build("hi", MessageKind::Message, &bob, "generalmain")),
    )
    .await;
    let msg = recv_msg(&mut a).await;
    assert_eq!(msg.content, "hi");
    assert_eq!(msg.username, "bob");
    assert_eq!(msg.kind, MessageKind::Message);
    assert_eq!(msg.time.len(), 5);

    // Degenerate empty image still arrives as a well-formed event.
    emit(
        &mut b,
        &ClientEvent::ImageMessage(ChatMessage::build(
            "data:image/png;base64,",
            MessageKind::Image,
            &bob,
            "generalmain",
        )),
    )
    .await;
    let img = recv_msg(&mut a).await;
    assert_eq!(img.kind, MessageKind::Image);
    assert_eq!(img.content, "data:image/png;base64,");

    b.close(None).await.expect("close");
    let departure = recv_msg(&mut a).await;
    assert_eq!(departure.content, "UPDATE: bob left the channel");
    assert_eq!(departure.kind, MessageKind::Status);

    assert_silent(&mut a).await;
}

#[tokio::test]
async fn single_sender_messages_arrive_in_emission_order() {
    let addr = start_server().await;

    let ada = sender("ada");
    let carl = sender("carl");

    let mut a = connect(addr).await;
    join(&mut a, &ada, "fiforoom").await;

    let mut c = connect(addr).await;
    join(&mut c, &carl, "fiforoom").await;
    assert_eq!(recv_msg(&mut a).await.kind, MessageKind::Status);

    for i in 0..20 {
        emit(
            &mut c,
            &ClientEvent::Message(ChatMessage::build(
                format!("m{i}"),
                MessageKind::Message,
                &carl,
                "fiforoom",
            )),
        )
        .await;
    }

    for i in 0..20 {
        assert_eq!(recv_msg(&mut a).await.content, format!("m{i}"));
    }
}

#[tokio::test]
async fn explicit_leave_is_announced_exactly_once() {
    let addr = start_server().await;

    let ada = sender("ada");
    let bob = sender("bob");

    let mut a = connect(addr).await;
    join(&mut a, &ada, "leaveroom").await;

    let mut b = connect(addr).await;
    join(&mut b, &bob, "leaveroom").await;
    assert_eq!(recv_msg(&mut a).await.kind, MessageKind::Status);

    emit(&mut b, &ClientEvent::LeaveRoom(ChatMessage::left(&bob, "leaveroom"))).await;
    let departure = recv_msg(&mut a).await;
    assert_eq!(departure.content, "UPDATE: bob left the channel");

    // Tearing down the transport afterwards must not announce a second time.
    // The server may already be closing from its side, so ignore the result.
    let _ = b.close(None).await;
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn slow_consumer_is_disconnected_and_announced() {
    // Tiny queues so a non-reading member overflows quickly once the
    // transport buffers fill up.
    let (addr, serving) = warp::serve(routes(Directory::seeded(), Server::with_queue_capacity(2)))
        .bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(serving);

    let carl = sender("carl");
    let bob = sender("bob");

    let mut c = connect(addr).await;
    join(&mut c, &carl, "floodroom").await;

    let mut b = connect(addr).await;
    join(&mut b, &bob, "floodroom").await;
    assert_eq!(recv_msg(&mut c).await.kind, MessageKind::Status);

    // bob never reads; large frames pile up until his queue overflows and
    // the registry evicts him, announcing the departure to the room.
    let payload = format!("data:image/png;base64,{}", "A".repeat(1_000_000));
    let mut departure = None;
    for _ in 0..64 {
        emit(
            &mut c,
            &ClientEvent::ImageMessage(ChatMessage::build(
                payload.clone(),
                MessageKind::Image,
                &carl,
                "floodroom",
            )),
        )
        .await;

        if let Ok(Some(Ok(Message::Text(text)))) = timeout(Duration::from_millis(100), c.next()).await {
            let ServerEvent::ReceiveMsg(msg) =
                serde_json::from_str(text.as_str()).expect("server event");
            departure = Some(msg);
            break;
        }
    }

    let departure = departure.expect("slow consumer should be evicted and announced");
    assert_eq!(departure.content, "UPDATE: bob left the channel");
    assert_eq!(departure.kind, MessageKind::Status);

    // The evicted transport is torn down, not left half-open: after the
    // buffered frames drain, bob's stream ends.
    let closed = timeout(Duration::from_secs(10), async {
        while let Some(frame) = b.next().await {
            if frame.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "evicted connection should close");
}

#[tokio::test]
async fn rooms_are_isolated() {
    let addr = start_server().await;

    let ada = sender("ada");
    let bob = sender("bob");

    let mut a = connect(addr).await;
    join(&mut a, &ada, "redmain").await;

    let mut b = connect(addr).await;
    join(&mut b, &bob, "bluemain").await;

    emit(
        &mut b,
        &ClientEvent::Message(ChatMessage::build("psst", MessageKind::Message, &bob, "bluemain")),
    )
    .await;

    assert_silent(&mut a).await;
}
