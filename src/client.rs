//! Terminal client: a thin I/O front-end.
//!
//! The server is authoritative for everything; the client only turns stdin
//! commands into frames and renders whatever the server broadcasts. The
//! nickname never crosses the wire, it is a local display label.

use std::net::IpAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::config::validate_nick;
use crate::error::{Error, Result};
use crate::protocol::{wire, Frame, FrameKind};

pub struct ClientOptions {
    pub ip: IpAddr,
    pub port: u16,
    pub nick: String,
}

/// One stdin command.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Bet(f32),
    Cashout,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let mut t = line.split_whitespace();
        match t.next()? {
            "bet" => Some(Command::Bet(t.next()?.parse().ok()?)),
            "cashout" => Some(Command::Cashout),
            "quit" | "bye" => Some(Command::Quit),
            _ => None,
        }
    }

    fn frame(&self) -> Frame {
        match *self {
            Command::Bet(amount) => Frame::request(FrameKind::Bet, amount),
            Command::Cashout => Frame::request(FrameKind::Cashout, 0.0),
            Command::Quit => Frame::request(FrameKind::Bye, 0.0),
        }
    }
}

/// Render one server frame. Returns true when the session is over.
fn render_frame(frame: &Frame) -> bool {
    match frame.kind {
        FrameKind::Start => println!("round open -- place your bets"),
        FrameKind::Closed => println!("bets closed; explodes at {:.2}x", frame.value),
        FrameKind::Multiplier => println!("m = {:.2}x", frame.value),
        FrameKind::Explode => println!("exploded at {:.2}x", frame.value),
        FrameKind::Payout => println!(
            "payout {:.2} | your profit {:.2} | house {:.2}",
            frame.value, frame.player_profit, frame.house_profit
        ),
        FrameKind::Profit => println!(
            "your profit {:.2} | house {:.2}",
            frame.player_profit, frame.house_profit
        ),
        FrameKind::Bye => {
            println!("server says goodbye");
            return true;
        }
        // client-to-server tags never arrive here; ignore if they do
        FrameKind::Bet | FrameKind::Cashout => {}
    }
    false
}

/// Connect and run the REPL until the server says goodbye or stdin closes.
pub async fn run(opts: ClientOptions) -> Result<()> {
    validate_nick(&opts.nick)?;
    let stream = TcpStream::connect((opts.ip, opts.port)).await.map_err(|e| {
        Error::Fatal(format!("cannot connect to {}:{}: {}", opts.ip, opts.port, e))
    })?;
    let (mut read_half, mut write_half) = stream.into_split();

    println!(
        "connected as {} -- commands: bet <amount>, cashout, quit",
        opts.nick
    );

    let mut render = tokio::spawn(async move {
        loop {
            match wire::recv_frame(&mut read_half).await {
                Ok(frame) => {
                    if render_frame(&frame) {
                        break;
                    }
                }
                Err(Error::PeerGone) => {
                    println!("server closed the connection");
                    break;
                }
                Err(err) => {
                    eprintln!("receive error: {}", err);
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = &mut render => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed: announce departure and wait for the ack
                    _ => {
                        let _ = wire::send_frame(&mut write_half, &Command::Quit.frame()).await;
                        let _ = render.await;
                        break;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match Command::parse(trimmed) {
                    Some(cmd) => {
                        if wire::send_frame(&mut write_half, &cmd.frame()).await.is_err() {
                            break;
                        }
                    }
                    None => println!("unrecognised command: {:?}", trimmed),
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse() {
        assert_eq!(Command::parse("bet 100"), Some(Command::Bet(100.0)));
        assert_eq!(Command::parse("  bet 2.5 "), Some(Command::Bet(2.5)));
        assert_eq!(Command::parse("cashout"), Some(Command::Cashout));
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("bye"), Some(Command::Quit));
        assert_eq!(Command::parse("bet"), None);
        assert_eq!(Command::parse("bet ten"), None);
        assert_eq!(Command::parse("raise 5"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn commands_map_to_request_frames() {
        let frame = Command::Bet(42.0).frame();
        assert_eq!(frame.kind, FrameKind::Bet);
        assert_eq!(frame.value, 42.0);
        assert_eq!(Command::Cashout.frame().kind, FrameKind::Cashout);
        assert_eq!(Command::Quit.frame().kind, FrameKind::Bye);
    }
}
