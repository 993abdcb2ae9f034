//! 牌桌服务器的端到端测试
//!
//! 每个测试都在本地随机端口上启动一个固定种子的服务器，
//! 再用普通的 TCP 客户端按行协议与它交互。

use doudizhu_core::{
    Card, HAND_SIZE, KITTY_SIZE, SEAT_COUNT, Seat, ServerMessage, TurnKind, sort_cards,
};
use doudizhu_server::{Server, ServerConfig};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// 在后台启动一个固定种子的服务器
async fn start_server(seed: u64) -> SocketAddr {
    let config = ServerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        seed: Some(seed),
    };
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        TestClient {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// 连接并等待分配座位
    async fn join(addr: SocketAddr) -> (Self, Seat) {
        let mut client = TestClient::connect(addr).await;
        match client.expect().await {
            ServerMessage::Seat(seat) => (client, seat),
            other => panic!("expected SEAT, got {:?}", other),
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
    }

    /// 下一条消息；服务器关闭连接后返回 `None`
    async fn recv(&mut self) -> Option<ServerMessage> {
        let mut line = String::new();
        let n = timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        if n == 0 {
            return None;
        }
        Some(line.trim_end().parse().unwrap())
    }

    async fn expect(&mut self) -> ServerMessage {
        self.recv().await.expect("server closed the connection")
    }

    /// 一小段时间内没有收到任何消息
    async fn assert_quiet(&mut self) {
        let mut line = String::new();
        if let Ok(result) =
            timeout(Duration::from_millis(300), self.reader.read_line(&mut line)).await
        {
            panic!("unexpected line {:?} ({:?})", line, result);
        }
    }

    /// 以零 linger 关闭连接，对端会收到 RST 而不是 FIN
    #[allow(deprecated)]
    fn reset(self) {
        let stream = self.reader.into_inner().reunite(self.writer).unwrap();
        stream.set_linger(Some(Duration::ZERO)).unwrap();
        drop(stream);
    }
}

/// 按座位顺序坐满三个座位，已在座的玩家会收到后来者的 JOIN
async fn full_table(addr: SocketAddr) -> Vec<TestClient> {
    let mut clients: Vec<TestClient> = Vec::new();
    for expected in 0..SEAT_COUNT {
        let (client, seat) = TestClient::join(addr).await;
        assert_eq!(seat, expected);
        for seated in clients.iter_mut() {
            assert_eq!(seated.expect().await, ServerMessage::Join(seat));
        }
        clients.push(client);
    }
    clients
}

/// 三家依次准备；返回每个座位的手牌和第一个叫分的座位
async fn deal(clients: &mut [TestClient]) -> (Vec<Vec<Card>>, Seat) {
    for seat in 0..SEAT_COUNT {
        clients[seat].send("1").await;
        for client in clients.iter_mut() {
            assert_eq!(client.expect().await, ServerMessage::Ready(seat));
        }
    }

    let mut hands = Vec::new();
    let mut bidder = None;
    for client in clients.iter_mut() {
        match client.expect().await {
            ServerMessage::Hand(hand) => hands.push(hand),
            other => panic!("expected HAND, got {:?}", other),
        }
        match client.expect().await {
            ServerMessage::Turn { seat, kind: TurnKind::Bid } => {
                assert!(bidder.is_none_or(|b| b == seat));
                bidder = Some(seat);
            }
            other => panic!("expected TURN BID, got {:?}", other),
        }
    }
    (hands, bidder.unwrap())
}

// 手牌中张数最多的同点数牌组，总是一手合法的首出牌
fn largest_group(hand: &[Card]) -> Vec<Card> {
    let mut groups: BTreeMap<u8, Vec<Card>> = BTreeMap::new();
    for card in hand {
        groups.entry(card.weight()).or_default().push(*card);
    }
    let mut group = groups.into_values().max_by_key(|g| g.len()).unwrap();
    sort_cards(&mut group);
    group
}

fn card_ids(cards: &[Card]) -> String {
    cards.iter().map(|c| c.id().to_string()).collect::<Vec<_>>().join(",")
}

#[tokio::test]
async fn test_seats_assigned_in_order_and_fourth_rejected() {
    let addr = start_server(42).await;
    let _clients = full_table(addr).await;

    let mut fourth = TestClient::connect(addr).await;
    assert_eq!(fourth.recv().await, Some(ServerMessage::Full));
    assert_eq!(fourth.recv().await, None);
}

#[tokio::test]
async fn test_full_round_to_first_play() {
    let addr = start_server(42).await;
    let mut clients = full_table(addr).await;

    let (hands, bidder) = deal(&mut clients).await;
    assert!(hands.iter().all(|h| h.len() == HAND_SIZE));

    clients[bidder].send("BID|3").await;
    let mut landlord_hand = hands[bidder].clone();
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Bid { seat: bidder, score: 3 });
        match client.expect().await {
            ServerMessage::Landlord { seat, kitty } => {
                assert_eq!(seat, bidder);
                assert_eq!(kitty.len(), KITTY_SIZE);
                if landlord_hand.len() == HAND_SIZE {
                    landlord_hand.extend(kitty);
                }
            }
            other => panic!("expected LANDLORD, got {:?}", other),
        }
        assert_eq!(client.expect().await, ServerMessage::Turn {
            seat: bidder,
            kind: TurnKind::Play
        });
    }

    // 地主出手牌里最大的同点数牌组（有炸弹时就是炸弹）
    let group = largest_group(&landlord_hand);
    clients[bidder].send(&format!("PLAY|{}", card_ids(&group))).await;
    let next = (bidder + 1) % SEAT_COUNT;
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Play {
            seat: bidder,
            cards: group.clone()
        });
        assert_eq!(client.expect().await, ServerMessage::Turn { seat: next, kind: TurnKind::Play });
    }

    // 下一家可以不出
    clients[next].send("PASS").await;
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Pass(next));
        assert_eq!(client.expect().await, ServerMessage::Turn {
            seat: (next + 1) % SEAT_COUNT,
            kind: TurnKind::Play
        });
    }
}

#[tokio::test]
async fn test_malformed_and_out_of_phase_lines_are_ignored() {
    let addr = start_server(7).await;
    let mut clients = full_table(addr).await;

    clients[1].send("HELLO").await;
    clients[1].send("").await;
    clients[1].send("BID|2").await;
    clients[1].send("PLAY|0,1").await;
    clients[1].send("1").await;

    // 前面的消息没有产生任何输出，第一条收到的就是 READY
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Ready(1));
    }
}

#[tokio::test]
async fn test_disconnect_while_waiting_cancels_ready() {
    let addr = start_server(7).await;
    let mut clients = full_table(addr).await;

    clients[2].send("1").await;
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Ready(2));
    }

    drop(clients.pop());
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Leave(2));
        assert_eq!(client.expect().await, ServerMessage::Cancel(2));
    }

    // 空出的座位分配给新连接
    let (_client, seat) = TestClient::join(addr).await;
    assert_eq!(seat, 2);
    for client in clients.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Join(2));
    }
}

#[tokio::test]
async fn test_disconnect_mid_game_resets_table() {
    let addr = start_server(42).await;
    let mut clients = full_table(addr).await;
    let (_, bidder) = deal(&mut clients).await;

    let leaver = (bidder + 1) % SEAT_COUNT;
    drop(clients.remove(leaver));

    let mut remaining: Vec<(Seat, TestClient)> = (0..SEAT_COUNT)
        .filter(|s| *s != leaver)
        .zip(clients)
        .collect();
    for (_, client) in remaining.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Leave(leaver));
        assert_eq!(client.expect().await, ServerMessage::Reset);
    }

    // 新玩家坐到空出的座位上，牌桌可以重新开始
    let (newcomer, seat) = TestClient::join(addr).await;
    assert_eq!(seat, leaver);
    for (_, client) in remaining.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Join(leaver));
    }
    remaining.push((seat, newcomer));
    remaining.sort_by_key(|(s, _)| *s);

    let mut clients: Vec<TestClient> = remaining.into_iter().map(|(_, c)| c).collect();
    let (hands, _) = deal(&mut clients).await;
    assert!(hands.iter().all(|h| h.len() == HAND_SIZE));
}

#[tokio::test]
async fn test_reset_peer_leaves_table_once() {
    let addr = start_server(42).await;
    let mut clients = full_table(addr).await;
    let (_, bidder) = deal(&mut clients).await;

    let leaver = (bidder + 1) % SEAT_COUNT;
    clients.remove(leaver).reset();

    let mut remaining: Vec<(Seat, TestClient)> = (0..SEAT_COUNT)
        .filter(|s| *s != leaver)
        .zip(clients)
        .collect();

    // 叫分会广播给所有座位，包括已经断开的那个，让它的读端和写端都可能报告关闭
    for (seat, client) in remaining.iter_mut() {
        if *seat == bidder {
            client.send("BID|1").await;
        }
    }

    for (_, client) in remaining.iter_mut() {
        let mut leaves = 0;
        loop {
            match client.expect().await {
                ServerMessage::Reset => break,
                ServerMessage::Leave(seat) => {
                    assert_eq!(seat, leaver);
                    leaves += 1;
                }
                ServerMessage::Bid { .. } | ServerMessage::Turn { .. } => {}
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(leaves, 1);
        // 第二次关闭事件不会再产生 LEAVE 或 RESET
        client.assert_quiet().await;
    }

    let (_newcomer, seat) = TestClient::join(addr).await;
    assert_eq!(seat, leaver);
    for (_, client) in remaining.iter_mut() {
        assert_eq!(client.expect().await, ServerMessage::Join(leaver));
    }
}

#[tokio::test]
async fn test_seeded_servers_deal_identically() {
    let mut first = full_table(start_server(99).await).await;
    let mut second = full_table(start_server(99).await).await;

    assert_eq!(deal(&mut first).await, deal(&mut second).await);
}
