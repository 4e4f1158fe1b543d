// SPDX-FileCopyrightText: 2026 The Gitgate Project Developers
// SPDX-License-Identifier: Apache-2.0

use gitgate::server::lookup::RepositoryInspector;
use gitgate::server::{App, Config, Directory};
use gitgate::types::{Change, Container, Rev};

use std::net::Ipv4Addr;

use async_std::net::{TcpListener, TcpStream};
use async_std::sync::Arc;
use futures::{AsyncReadExt, AsyncWriteExt};

/// Treats every revision as holding a single file and every push as empty.
pub struct Inspector;

#[gitgate::server::async_trait]
impl RepositoryInspector for Inspector {
    async fn count_files(&self, _: &Container, _: &Rev, _: usize) -> anyhow::Result<usize> {
        Ok(1)
    }

    async fn new_bytes(&self, _: &Container, _: &Change) -> anyhow::Result<u64> {
        Ok(0)
    }
}

pub const SHARED_SECRET: &str = "s3cret";

pub fn app(directory: &str) -> App {
    let config = Config {
        shared_secret: Some(SHARED_SECRET.into()),
        ..Default::default()
    };
    App::builder(config)
        .directory(Arc::new(Directory::from_toml(directory).unwrap()))
        .inspector(Arc::new(Inspector))
        .build()
        .unwrap()
}

/// A parsed HTTP/1.1 response.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves a single connection of `app` and sends `head` and `body` through it.
pub async fn request(app: &App, head: &str, body: &str) -> Response {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = async {
        let (stream, peer) = listener.accept().await.unwrap();
        app.handle(stream, Some(peer)).await.unwrap();
    };
    let client = async {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let req = format!(
            "{head}\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut res = String::new();
        let _ = stream.read_to_string(&mut res).await.unwrap();
        res
    };
    let ((), res) = futures::join!(server, client);

    let (head, body) = res.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .unwrap()
        .parse()
        .unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Response {
        status,
        headers,
        body: body.into(),
    }
}
