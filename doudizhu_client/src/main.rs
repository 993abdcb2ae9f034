use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use doudizhu_core::{Card, ClientMessage, ServerMessage, Side, TurnKind, parse_cards};

const DEFAULT_SERVER: &str = "127.0.0.1:8888";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::var("DDZ_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());

    println!("正在连接到: {}", addr);
    let stream = TcpStream::connect(&addr).await?;
    println!("连接成功!");

    let (read, mut write) = stream.into_split();

    // 启动一个任务来处理从服务器接收的消息
    let receiver = tokio::spawn(async move {
        let mut lines = BufReader::new(read).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    match line.parse::<ServerMessage>() {
                        Ok(msg) => println!("\n<-- {}", describe(&msg)),
                        Err(e) => eprintln!("\n<-- {} (无法解析: {})", line, e),
                    }
                    prompt();
                }
                Ok(None) => {
                    println!("\n服务器关闭了连接");
                    break;
                }
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 斗地主客户端 ---");
    println!("可用命令:");
    println!("  ready                     - 准备");
    println!("  unready                   - 取消准备");
    println!("  bid <0-3>                 - 叫分，0 为不叫");
    println!("  play <牌编号,...>         - 出牌，例如 play 0,13");
    println!("  pass                      - 不出");
    println!("  raw <原始消息>            - 直接发送一行协议文本");
    println!("  exit                      - 退出");

    loop {
        prompt();

        let Some(line) = stdin.next_line().await? else {
            break;
        };
        if receiver.is_finished() {
            break;
        }
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let payload = match command {
            "" => continue,
            "ready" => ClientMessage::Ready.to_string(),
            "unready" => ClientMessage::Unready.to_string(),
            "pass" => ClientMessage::Pass.to_string(),
            "bid" => match rest.parse::<u8>() {
                Ok(score) => ClientMessage::Bid(score).to_string(),
                Err(_) => {
                    println!("用法: bid <0-3>");
                    continue;
                }
            },
            "play" => {
                // 允许用空格或逗号分隔
                let ids = rest.split_whitespace().collect::<Vec<_>>().join(",");
                match parse_cards(&ids) {
                    Ok(cards) => ClientMessage::Play(cards).to_string(),
                    Err(e) => {
                        println!("无效的牌: {}", e);
                        continue;
                    }
                }
            }
            "raw" => rest.to_string(),
            "exit" => {
                println!("正在断开连接...");
                break;
            }
            _ => {
                println!("未知命令: {}", line);
                continue;
            }
        };

        write.write_all(format!("{}\n", payload).as_bytes()).await?;
    }

    Ok(())
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

// 牌的显示形式：编号:名称
fn card_list(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| format!("{}:{}", c.id(), c))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::Seat(seat) => format!("你坐在 {} 号座位", seat),
        ServerMessage::Join(seat) => format!("有玩家坐到了 {} 号座位", seat),
        ServerMessage::Leave(seat) => format!("{} 号座位的玩家离开了", seat),
        ServerMessage::Ready(seat) => format!("{} 号座位已准备", seat),
        ServerMessage::Cancel(seat) => format!("{} 号座位取消准备", seat),
        ServerMessage::Hand(cards) => format!("你的手牌: {}", card_list(cards)),
        ServerMessage::Turn { seat, kind: TurnKind::Bid } => format!("轮到 {} 号座位叫分", seat),
        ServerMessage::Turn { seat, kind: TurnKind::Play } => format!("轮到 {} 号座位出牌", seat),
        ServerMessage::Bid { seat, score: 0 } => format!("{} 号座位不叫", seat),
        ServerMessage::Bid { seat, score } => format!("{} 号座位叫 {} 分", seat, score),
        ServerMessage::Landlord { seat, kitty } => {
            format!("{} 号座位成为地主，底牌: {}", seat, card_list(kitty))
        }
        ServerMessage::Play { seat, cards } => {
            format!("{} 号座位出牌: {}", seat, card_list(cards))
        }
        ServerMessage::Pass(seat) => format!("{} 号座位不出", seat),
        ServerMessage::Winner(Side::Landlord) => "地主获胜!".to_string(),
        ServerMessage::Winner(Side::Farmers) => "农民获胜!".to_string(),
        ServerMessage::Reset => "牌桌已重置，请重新准备".to_string(),
        ServerMessage::Full => "牌桌已满".to_string(),
    }
}
