//! Handles to outstanding requests.

use crate::error::ClientError;
use crate::response::Response;
use crate::session::Session;
use crate::transport::Transport;
use rsftp_protocol::OperationKind;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// An issued request.
///
/// The reply is delivered through the session's dispatch loop; until then
/// the request is pending. `C` is caller data carried alongside the request,
/// e.g. the offset a pipelined read was issued at.
#[derive(Debug)]
pub struct Request<C = ()> {
    id: u32,
    kind: OperationKind,
    receiver: oneshot::Receiver<Response>,
    response: Option<Response>,
    context: C,
}

impl Request<()> {
    pub(crate) fn new(id: u32, kind: OperationKind, receiver: oneshot::Receiver<Response>) -> Self {
        Self {
            id,
            kind,
            receiver,
            response: None,
            context: (),
        }
    }
}

impl<C> Request<C> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Attaches caller data.
    pub fn with_context<D>(self, context: D) -> Request<D> {
        Request {
            id: self.id,
            kind: self.kind,
            receiver: self.receiver,
            response: self.response,
            context,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// The reply, once it has been collected.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Whether `session` still awaits this request's reply.
    pub fn is_pending<T: Transport>(&self, session: &Session<T>) -> bool {
        session.is_pending(self.id)
    }

    /// Drives `session` until this request has its reply.
    pub async fn wait<T: Transport>(
        &mut self,
        session: &mut Session<T>,
    ) -> Result<&Response, ClientError> {
        session.wait(self).await
    }

    /// Moves a delivered reply into the request. Returns whether a reply is
    /// now available.
    pub(crate) fn collect(&mut self) -> Result<bool, ClientError> {
        if self.response.is_some() {
            return Ok(true);
        }
        match self.receiver.try_recv() {
            Ok(response) => {
                self.response = Some(response);
                Ok(true)
            }
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Closed) => Err(ClientError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SessionConfig;
    use crate::session::tests::{handle_reply, open_session, status};
    use bytes::Bytes;
    use rsftp_protocol::{Attributes, OpenMode, StatusCode};

    #[tokio::test]
    async fn test_context_survives_wait() {
        let mut session = open_session(3, SessionConfig::new()).await;

        let mut request = session
            .write(Bytes::from_static(b"h"), 4096, Bytes::from_static(b"abc"))
            .unwrap()
            .with_context((4096u64, 3usize));
        *request.context_mut() = (4096, 2);

        session.transport_mut().push(status(0, StatusCode::OK, ""));
        assert!(request.wait(&mut session).await.unwrap().ok());
        assert!(request.response().is_some());
        assert_eq!(request.into_context(), (4096, 2));
    }

    #[tokio::test]
    async fn test_take_response() {
        let mut session = open_session(3, SessionConfig::new()).await;

        let mut request = session
            .open("/etc/motd", OpenMode::Read, Attributes::new())
            .unwrap();
        assert!(request.response().is_none());

        session.transport_mut().push(handle_reply(0, b"fh"));
        request.wait(&mut session).await.unwrap();
        let response = request.take_response().unwrap();
        assert_eq!(response.handle().unwrap().as_ref(), b"fh");
        assert!(request.response().is_none());
    }
}
