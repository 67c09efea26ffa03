//! Shared test doubles for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use telemetry_gateway::delivery::transport::{Connection, Transport};

/// What the scripted peer does on each call.
#[derive(Default)]
pub struct Script {
    /// Results for successive `connect` calls; `Ok(())` once exhausted.
    pub connects: VecDeque<io::Result<()>>,
    /// Results for successive `receive` calls; would-block once exhausted.
    pub receives: VecDeque<io::Result<Vec<u8>>>,
    /// Largest number of bytes accepted per `send`.
    pub send_limit: Option<usize>,
    /// Everything sent, across connections.
    pub sent: Vec<u8>,
    /// Connections opened.
    pub opened: usize,
    /// Connections closed.
    pub closed: usize,
}

impl Script {
    /// Queue a response delivered in one read, followed by a would-block.
    pub fn respond(&mut self, response: &[u8]) {
        self.receives.push_back(Ok(response.to_vec()));
        self.receives
            .push_back(Err(io::ErrorKind::WouldBlock.into()));
    }

    /// Sent bytes as text.
    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

/// Transport whose connections all follow one shared [`Script`].
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for ScriptedTransport {
    type Connection = ScriptedConnection;

    fn open(&mut self) -> io::Result<ScriptedConnection> {
        self.script.borrow_mut().opened += 1;
        Ok(ScriptedConnection {
            script: Rc::clone(&self.script),
        })
    }
}

pub struct ScriptedConnection {
    script: Rc<RefCell<Script>>,
}

impl Connection for ScriptedConnection {
    fn connect(&mut self) -> io::Result<()> {
        self.script.borrow_mut().connects.pop_front().unwrap_or(Ok(()))
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.script.borrow_mut();
        let n = script.send_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        script.sent.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.borrow_mut().receives.pop_front() {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.script.borrow_mut().closed += 1;
        Ok(())
    }
}

/// `HTTP/1.1 200 OK` response echoing `record`.
pub fn echo_response(record: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        record.len()
    )
    .into_bytes();
    response.extend_from_slice(record);
    response
}
