//! Asynchronous connection: frames backend messages for cursors.

use std::collections::VecDeque;
use std::future::Future;

use tokio::io::AsyncRead;

use crate::buffer_set::BufferSet;
use crate::error::{Error, Result};
use crate::protocol::backend::{AsyncMessage, RawMessage, ReadyForQuery, msg_type};
use crate::protocol::types::TransactionStatus;
use crate::source::{AsyncConnection, AsyncMessageSource, ConnState, ReadMode};

use super::stream::Stream;

/// Asynchronous connection over any tokio reader.
///
/// A read that is cancelled part-way leaves the stream inside a message. The
/// connection notices this on the next read and reports itself broken.
pub struct Conn<S> {
    stream: Stream<S>,
    state: ConnState,
    transaction_status: TransactionStatus,
    server_params: Vec<(String, String)>,
    async_messages: VecDeque<AsyncMessage>,
    messages_read: u64,
    /// A read future was started and has not finished
    in_flight: bool,
}

impl<S: AsyncRead + Unpin + Send> Conn<S> {
    /// Wrap a stream positioned at the start of a command's response.
    pub fn new(inner: S) -> Self {
        Self {
            stream: Stream::new(inner),
            state: ConnState::Executing,
            transaction_status: TransactionStatus::Idle,
            server_params: Vec::new(),
            async_messages: VecDeque::new(),
            messages_read: 0,
            in_flight: false,
        }
    }

    /// Server parameters reported by ParameterStatus.
    pub fn server_params(&self) -> &[(String, String)] {
        &self.server_params
    }

    /// Transaction status from the last ReadyForQuery.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction_status
    }

    /// Returns true if the connection is broken and cannot be reused.
    pub fn is_broken(&self) -> bool {
        self.state == ConnState::Broken
    }

    /// Number of messages read from the stream, including absorbed ones.
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Take the notices, notifications and parameter changes received so far.
    pub fn take_async_messages(&mut self) -> Vec<AsyncMessage> {
        self.async_messages.drain(..).collect()
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Unwrap the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    fn absorb(&mut self, msg: RawMessage<'_>) -> Result<()> {
        let message = AsyncMessage::parse(msg)?;
        tracing::debug!("async message: {:?}", message);
        if let AsyncMessage::ParameterChanged { name, value } = &message {
            match self.server_params.iter_mut().find(|(n, _)| n == name) {
                Some(param) => param.1 = value.clone(),
                None => self.server_params.push((name.clone(), value.clone())),
            }
        }
        self.async_messages.push_back(message);
        Ok(())
    }

    async fn read_message_inner(
        &mut self,
        buffer_set: &mut BufferSet,
        mode: ReadMode,
    ) -> Result<()> {
        loop {
            let (type_byte, len) = self.stream.read_header().await?;
            self.messages_read += 1;
            buffer_set.type_byte = type_byte;

            if mode == ReadMode::Discard && type_byte == msg_type::DATA_ROW {
                self.stream.discard(len).await?;
                buffer_set.read_buffer.clear();
                return Ok(());
            }

            self.stream
                .read_payload(&mut buffer_set.read_buffer, len)
                .await?;

            if RawMessage::is_async_type(type_byte) {
                self.absorb(RawMessage::new(type_byte, &buffer_set.read_buffer))?;
                continue;
            }

            if type_byte == msg_type::READY_FOR_QUERY {
                let ready = ReadyForQuery::parse(&buffer_set.read_buffer)?;
                if let Some(status) = ready.transaction_status() {
                    self.transaction_status = status;
                }
            }
            return Ok(());
        }
    }
}

impl<S: AsyncRead + Unpin + Send> AsyncMessageSource for Conn<S> {
    fn read_message(
        &mut self,
        buffer_set: &mut BufferSet,
        mode: ReadMode,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            if self.in_flight {
                tracing::error!("previous read was cancelled mid-message");
                self.in_flight = false;
                self.state = self.state.transition(ConnState::Broken);
            }
            match self.state {
                ConnState::Closed => {
                    return Err(Error::InvalidUsage("connection is closed".into()));
                }
                ConnState::Broken => return Err(Error::ConnectionBroken),
                _ => {}
            }

            self.in_flight = true;
            let result = self.read_message_inner(buffer_set, mode).await;
            self.in_flight = false;
            if let Err(e) = &result {
                tracing::error!("connection broken while reading: {}", e);
                self.state = ConnState::Broken;
            }
            result
        }
    }
}

impl<S: AsyncRead + Unpin + Send> AsyncConnection for Conn<S> {
    fn state(&self) -> ConnState {
        self.state
    }

    fn set_state(&mut self, state: ConnState) {
        self.state = self.state.transition(state);
    }

    fn close(&mut self) -> Result<()> {
        self.state = ConnState::Closed;
        Ok(())
    }
}
