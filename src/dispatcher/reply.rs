use may::sync::mpsc;
use tracing::debug;

use crate::entity::Identifier;

/// What a handler sends back. `None` means "no body".
pub type Reply = Option<Box<dyn Identifier>>;

/// The handler's half of a request's reply channel.
///
/// `send` consumes the sender, so a handler replies at most once. The channel
/// never blocks the sender: a reply arriving after the dispatcher gave up is
/// dropped and the handler coroutine finishes normally. Dropping the sender
/// without sending tells the dispatcher no reply is coming.
pub struct ReplySender {
    tx: mpsc::Sender<Reply>,
}

impl ReplySender {
    pub fn send(self, reply: Reply) {
        if self.tx.send(reply).is_err() {
            debug!("reply arrived after the dispatcher stopped waiting");
        }
    }

    /// Reply with an entity as the response body.
    pub fn send_entity<I: Identifier>(self, entity: I) {
        self.send(Some(Box::new(entity)));
    }

    /// Reply with no body.
    pub fn send_empty(self) {
        self.send(None);
    }
}

pub(crate) fn reply_channel() -> (ReplySender, mpsc::Receiver<Reply>) {
    let (tx, rx) = mpsc::channel();
    (ReplySender { tx }, rx)
}
