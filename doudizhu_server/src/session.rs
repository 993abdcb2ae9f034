//! 连接会话
//!
//! 每个 TCP 连接拆成两个任务：
//! - 读任务按 `\n` 分行，把每一行作为 `SessionEvent::Line` 交给管理器；
//!   单行最长 `MAX_LINE_LEN` 字节。读到 EOF、出错或行过长时发出一次
//!   `SessionEvent::Closed` 后退出，不再重试。
//! - 写任务从发送队列里逐条取出消息写入 socket，同一时刻只有一次写操作在进行，
//!   因此多次 `send` 的内容不会交错，并且严格按调用顺序送达。
//!   写失败时丢弃剩余队列、关闭 socket，并发出 `SessionEvent::Closed`。
//!
//! 外部只持有可克隆的 `SessionHandle`（会话 id + 队列发送端），不会拿到 socket 本身。

use std::fmt;
use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// 单行的最大字节数（不含行尾），超出时按读取错误关闭会话
pub const MAX_LINE_LEN: usize = 1024;

/// 会话上报给管理器的事件
#[derive(Debug)]
pub enum SessionEvent {
    /// 收到完整的一行（不含行尾）
    Line { id: SessionId, line: String },
    /// 会话已结束，每个会话最多上报一次读端的关闭和一次写端的关闭
    Closed { id: SessionId, reason: CloseReason },
}

#[derive(Debug)]
pub enum CloseReason {
    /// 对端关闭了连接
    Eof,
    ReadError(io::Error),
    WriteError(io::Error),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CloseReason::Eof => write!(f, "对端关闭连接"),
            CloseReason::ReadError(e) => write!(f, "读取失败: {}", e),
            CloseReason::WriteError(e) => write!(f, "写入失败: {}", e),
        }
    }
}

// 发送队列中的条目
#[derive(Debug)]
enum Outgoing {
    Line(String),
    Close,
}

/// 会话句柄
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    peer: SocketAddr,
    outbox: mpsc::UnboundedSender<Outgoing>,
    reader: AbortHandle,
}

impl SessionHandle {
    /// 接管一个已建立的连接，启动读写任务
    pub fn spawn(
        stream: TcpStream,
        peer: SocketAddr,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> SessionHandle {
        let id = Uuid::new_v4();
        let span = info_span!("session", %id, %peer);
        let (read_half, write_half) = stream.into_split();
        let (outbox, queue) = mpsc::unbounded_channel();

        let reader =
            tokio::spawn(read_loop(id, read_half, events.clone()).instrument(span.clone()));
        tokio::spawn(write_loop(id, write_half, queue, events).instrument(span));

        SessionHandle {
            id,
            peer,
            outbox,
            reader: reader.abort_handle(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// 把一行消息放入发送队列，不会阻塞
    ///
    /// 会话已经结束时返回 `false`，消息被丢弃。
    pub fn send(&self, line: impl Into<String>) -> bool {
        let mut line = line.into();
        line.push('\n');
        self.outbox.send(Outgoing::Line(line)).is_ok()
    }

    /// 关闭会话：停止读取，已排队的消息发送完后关闭 socket
    pub fn close(&self) {
        self.reader.abort();
        let _ = self.outbox.send(Outgoing::Close);
    }
}

async fn read_loop(
    id: SessionId,
    read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut reader = BufReader::new(read_half);
    let reason = loop {
        match next_line(&mut reader).await {
            Ok(Some(line)) => {
                debug!("<- {}", line);
                if events.send(SessionEvent::Line { id, line }).is_err() {
                    // 管理器已经退出
                    return;
                }
            }
            Ok(None) => break CloseReason::Eof,
            Err(e) => break CloseReason::ReadError(e),
        }
    };
    debug!("读端结束: {}", reason);
    let _ = events.send(SessionEvent::Closed { id, reason });
}

/// 读取一行，去掉行尾的 `\n` 或 `\r\n`
///
/// 每次最多从缓冲区取 `MAX_LINE_LEN + 2` 字节，内容超过 `MAX_LINE_LEN` 时返回 `InvalidData`。
/// 连接关闭前最后一段没有换行的内容仍作为一行返回。
async fn next_line(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let limit = MAX_LINE_LEN as u64 + 2;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_LINE_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("单行超过 {} 字节", MAX_LINE_LEN),
        ));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

async fn write_loop(
    id: SessionId,
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    while let Some(item) = queue.recv().await {
        let line = match item {
            Outgoing::Line(line) => line,
            Outgoing::Close => break,
        };
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            warn!("写入失败: {}", e);
            // 丢弃剩余的待发送消息
            queue.close();
            while queue.try_recv().is_ok() {}
            let _ = write_half.shutdown().await;
            let _ = events.send(SessionEvent::Closed {
                id,
                reason: CloseReason::WriteError(e),
            });
            return;
        }
        debug!("-> {}", line.trim_end());
    }
    let _ = write_half.shutdown().await;
}
