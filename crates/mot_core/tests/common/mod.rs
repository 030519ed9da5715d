//! Serviço HTTP falso para os testes de integração (`tiny_http`).
//!
//! Responde cada requisição com o `(status, corpo)` devolvido pela closure,
//! a partir do nome da função (último segmento do path), e grava o que
//! recebeu. Também usado pelos testes do binário `mot_agent`.

#![allow(dead_code)]

use serde_json::Value;
use std::net::SocketAddr;
use std::sync::mpsc::{Receiver, channel};
use std::time::Duration;
use tiny_http::{Response, Server};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub function: String,
    pub content_type: String,
    pub body: Value,
}

pub struct FakeService {
    addr: SocketAddr,
    requests: Receiver<Recorded>,
}

impl FakeService {
    pub fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, rx) = channel();

        std::thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let function = request
                    .url()
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let content_type = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Content-Type"))
                    .map(|h| h.value.as_str().to_string())
                    .unwrap_or_default();
                let body = serde_json::from_reader(request.as_reader()).unwrap_or(Value::Null);

                let _ = tx.send(Recorded {
                    function: function.clone(),
                    content_type,
                    body,
                });

                let (status, payload) = respond(&function);
                let _ = request.respond(Response::from_string(payload).with_status_code(status));
            }
        });

        Self { addr, requests: rx }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Próxima requisição recebida, se chegar dentro do prazo.
    pub fn next_request(&self, timeout: Duration) -> Option<Recorded> {
        self.requests.recv_timeout(timeout).ok()
    }

    /// Tudo que já chegou.
    pub fn drain(&self) -> Vec<Recorded> {
        self.requests.try_iter().collect()
    }
}
