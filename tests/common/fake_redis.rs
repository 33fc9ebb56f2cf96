//! Minimal Redis speaking the subset of RESP the token store uses.
//!
//! GET, SET and DEL act on a shared map, every other command (the client's
//! handshake) is acknowledged with `+OK`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Fake Redis server on a random local port, stopped when dropped
pub struct FakeRedis {
    pub url: String,
    data: Arc<Mutex<HashMap<String, String>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeRedis {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let data = Arc::new(Mutex::new(HashMap::new()));
        let shared = Arc::clone(&data);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&shared)));
            }
        });

        Self {
            url: format!("redis://127.0.0.1:{}/", port),
            data,
            task,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, data: Arc<Mutex<HashMap<String, String>>>) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await {
        let reply = answer(&args, &data);
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Read one `*N` array of bulk strings. `None` once the client hangs up.
async fn read_command(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Option<Vec<String>> {
    let header = read_line(reader).await?;
    let count: usize = header.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(reader).await?.strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end().to_string()),
    }
}

fn answer(args: &[String], data: &Mutex<HashMap<String, String>>) -> String {
    let mut data = data.lock().unwrap();
    match args {
        [cmd, key] if cmd.eq_ignore_ascii_case("GET") => match data.get(key) {
            Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
            None => "$-1\r\n".to_string(),
        },
        [cmd, key, value, ..] if cmd.eq_ignore_ascii_case("SET") => {
            data.insert(key.clone(), value.clone());
            "+OK\r\n".to_string()
        }
        [cmd, keys @ ..] if cmd.eq_ignore_ascii_case("DEL") => {
            let removed = keys.iter().filter(|k| data.remove(*k).is_some()).count();
            format!(":{}\r\n", removed)
        }
        _ => "+OK\r\n".to_string(),
    }
}
