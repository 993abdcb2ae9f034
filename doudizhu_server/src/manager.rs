//! 牌桌连接管理器
//!
//! 一个任务独占牌桌状态、座位到会话的映射和监听 socket，
//! 新连接、会话事件、停止信号都在同一个 `select!` 循环里串行处理，
//! 因此牌桌上的每个操作都不需要加锁。

use std::future::Future;
use std::net::SocketAddr;

use doudizhu_core::{
    ClientMessage, GamePhase, GameTable, Outbound, SEAT_COUNT, Seat, ServerMessage, Target,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::session::{SessionEvent, SessionHandle, SessionId};

pub struct Server {
    listener: TcpListener,
    table: GameTable,
    // 座位号 -> 会话，和 table 中的 occupied 始终一致
    seats: [Option<SessionHandle>; SEAT_COUNT],
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Server {
    /// 绑定监听地址；配置了种子时牌局可复现
    pub async fn bind(config: &ServerConfig) -> Result<Server> {
        let listener = TcpListener::bind(config.bind).await?;
        let table = match config.seed {
            Some(seed) => GameTable::with_seed(seed),
            None => GameTable::new(),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Server {
            listener,
            table,
            seats: Default::default(),
            events_tx,
            events_rx,
        })
    }

    /// 实际监听的地址（绑定端口 0 时可以由此得知系统分配的端口）
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 一直运行，直到进程退出
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// 运行到 `shutdown` 完成为止，退出前关闭所有会话
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("收到停止信号，服务器退出");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.on_accept(stream, peer),
                    Err(e) => warn!("接受连接失败: {}", e),
                },
                // events_tx 由自身持有，通道不会关闭
                Some(event) = self.events_rx.recv() => self.on_event(event),
            }
        }

        for handle in self.seats.iter().flatten() {
            handle.close();
        }
        Ok(())
    }

    /// 新连接：分配编号最小的空座位，满员则回复 FULL 后断开
    fn on_accept(&mut self, stream: TcpStream, peer: SocketAddr) {
        let Some(seat) = self.table.first_free_seat() else {
            info!("牌桌已满，拒绝连接 {}", peer);
            tokio::spawn(reject_full(stream, peer));
            return;
        };

        let handle = SessionHandle::spawn(stream, peer, self.events_tx.clone());
        info!("{} 入座 {}（会话 {}）", peer, seat, handle.id());
        self.seats[seat] = Some(handle);

        let out = self.table.seat_joined(seat);
        self.dispatch(out);
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Line { id, line } => {
                // 已离座的会话可能还有残留的行
                let Some(seat) = self.seat_of(id) else {
                    return;
                };
                let msg = match ClientMessage::parse(&line) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!("座位 {} 的消息 {:?} 无法解析: {}", seat, line, e);
                        return;
                    }
                };

                let before = self.table.phase();
                let out = self.table.handle_message(seat, msg);
                self.log_phase_change(before);
                self.dispatch(out);
            }
            SessionEvent::Closed { id, reason } => {
                // 同一个会话的第二次关闭事件在这里被忽略
                let Some(seat) = self.seat_of(id) else {
                    return;
                };
                info!("座位 {} 离开: {}", seat, reason);
                if let Some(handle) = self.seats[seat].take() {
                    handle.close();
                }

                let before = self.table.phase();
                let out = self.table.seat_left(seat);
                self.log_phase_change(before);
                self.dispatch(out);
            }
        }
    }

    fn seat_of(&self, id: SessionId) -> Option<Seat> {
        self.seats
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|h| h.id() == id))
    }

    /// 把牌桌产出的消息投递到对应座位的发送队列
    fn dispatch(&self, out: Vec<Outbound>) {
        for Outbound { target, message } in out {
            let line = message.to_string();
            match target {
                Target::All => {
                    for (seat, handle) in self.seats.iter().enumerate() {
                        if let Some(handle) = handle {
                            send_line(seat, handle, line.clone());
                        }
                    }
                }
                Target::Seat(seat) => {
                    if let Some(handle) = self.seats.get(seat).and_then(Option::as_ref) {
                        send_line(seat, handle, line);
                    }
                }
            }
        }
    }

    fn log_phase_change(&self, before: GamePhase) {
        let after = self.table.phase();
        if before == after {
            return;
        }
        match after {
            GamePhase::Playing => {
                info!("{:?} -> {:?}，地主为座位 {:?}", before, after, self.table.landlord())
            }
            _ => info!("{:?} -> {:?}", before, after),
        }
    }
}

fn send_line(seat: Seat, handle: &SessionHandle, line: String) {
    if !handle.send(line) {
        // 写任务已退出，随后会收到该会话的关闭事件
        debug!("向座位 {} 发送失败（会话 {} 已结束）", seat, handle.id());
    }
}

async fn reject_full(mut stream: TcpStream, peer: SocketAddr) {
    let line = format!("{}\n", ServerMessage::Full);
    if let Err(e) = stream.write_all(line.as_bytes()).await {
        debug!("向 {} 发送 FULL 失败: {}", peer, e);
    }
    let _ = stream.shutdown().await;
}
