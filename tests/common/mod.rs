#![allow(dead_code)]

pub mod test_server {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}

pub mod fixtures {
    use std::time::Duration;

    use valet::dispatcher::{DispatchPolicy, InputContext};
    use valet::securecookie::{CookieOptions, SecureCookie};

    pub const HASH_KEY: [u8; 32] = [0x11; 32];
    pub const BLOCK_KEY: [u8; 16] = [0x22; 16];

    pub fn codec_with(options: CookieOptions) -> SecureCookie {
        SecureCookie::new(HASH_KEY.to_vec(), BLOCK_KEY.to_vec(), options).unwrap()
    }

    pub fn codec() -> SecureCookie {
        codec_with(CookieOptions {
            path: "/".into(),
            max_age: 3600,
            ..CookieOptions::default()
        })
    }

    pub fn context() -> InputContext {
        InputContext::new(codec(), "v")
    }

    pub fn policy(reply_timeout: Duration) -> DispatchPolicy {
        DispatchPolicy {
            reply_timeout,
            ..DispatchPolicy::default()
        }
    }
}

/// A minimal input type and the stub handlers the dispatcher tests count on.
pub mod stubs {
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde::{Deserialize, Serialize};
    use valet::dispatcher::{
        parse_input, ConvertError, Handler, HandlerError, InputContext, InputEvent, ReplySender,
    };
    use valet::entity::Entity;
    use valet::securecookie::{MsgPackSerializer, Serializer};
    use valet::server::{HttpRequest, HttpResponse, RequestHead};

    pub const PING: &str = "ping";

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct PingBody {
        #[serde(default)]
        pub text: String,
    }

    pub struct PingInput {
        pub session_id: String,
        pub body: PingBody,
        pub type_id: &'static str,
        head: RequestHead,
    }

    impl InputEvent for PingInput {
        fn input_type_id(&self) -> &str {
            self.type_id
        }

        fn session_id(&self) -> &str {
            &self.session_id
        }

        fn request(&self) -> &RequestHead {
            &self.head
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
            self
        }
    }

    /// Converter producing a [`PingInput`] tagged with `type_id`.
    pub fn converter(
        type_id: &'static str,
    ) -> impl Fn(&HttpRequest, &mut HttpResponse, &InputContext) -> Result<Box<dyn InputEvent>, ConvertError>
           + Send
           + Sync
           + 'static {
        converter_with::<MsgPackSerializer>(type_id)
    }

    /// [`converter`] for a context sealing cookies with `S`.
    pub fn converter_with<S: Serializer>(
        type_id: &'static str,
    ) -> impl Fn(&HttpRequest, &mut HttpResponse, &InputContext<S>) -> Result<Box<dyn InputEvent>, ConvertError>
           + Send
           + Sync
           + 'static {
        move |req, res, ctx| {
            let (body, session) = parse_input::<PingBody, _>(req, res, ctx)?;
            Ok(Box::new(PingInput {
                session_id: session.id,
                body,
                type_id,
                head: RequestHead::from_request(req),
            }))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Pong {
        pub id: String,
        pub session_id: String,
        pub text: String,
    }

    impl Entity for Pong {
        const TYPE_ID: &'static str = PING;

        fn entity_id(&self) -> &str {
            &self.id
        }
    }

    fn unpack(input: Box<dyn InputEvent>) -> Result<PingInput, HandlerError> {
        input
            .into_any()
            .downcast::<PingInput>()
            .map(|b| *b)
            .map_err(|_| HandlerError::UnexpectedInput {
                expected: PING.to_owned(),
            })
    }

    /// Test-controlled release for [`Behavior::Parked`].
    #[derive(Clone)]
    pub struct Gate(Arc<Mutex<may::sync::mpsc::Receiver<()>>>);

    impl Gate {
        /// The gate and the sender that opens it.
        pub fn new() -> (Self, may::sync::mpsc::Sender<()>) {
            let (tx, rx) = may::sync::mpsc::channel();
            (Self(Arc::new(Mutex::new(rx))), tx)
        }

        fn wait(&self) {
            let rx = self.0.lock().unwrap();
            let _ = rx.recv();
        }
    }

    impl std::fmt::Debug for Gate {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("Gate")
        }
    }

    /// What a [`StubHandler`] does with its reply sender.
    #[derive(Debug, Clone)]
    pub enum Behavior {
        /// Reply with a [`Pong`]
        Echo,
        /// Reply with no body
        Empty,
        /// Hold the sender for the given time, then reply
        Slow(Duration),
        /// Never reply, keeping the sender alive for the given time
        Silent(Duration),
        /// Hold the sender until the gate opens, then reply
        Parked(Gate),
        /// Drop the sender and return an error
        Fail,
        /// Panic inside notify
        Panic,
    }

    /// Handler that counts `notify` calls and acts out a [`Behavior`].
    ///
    /// `finished` counts calls that got past their reply without blocking.
    pub struct StubHandler {
        pub type_id: &'static str,
        pub behavior: Behavior,
        pub calls: Arc<AtomicUsize>,
        pub finished: Arc<AtomicUsize>,
    }

    impl StubHandler {
        pub fn new(behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    type_id: PING,
                    behavior,
                    calls: Arc::clone(&calls),
                    finished: Arc::new(AtomicUsize::new(0)),
                },
                calls,
            )
        }
    }

    impl Handler for StubHandler {
        fn input_type_id(&self) -> &str {
            self.type_id
        }

        fn notify(&self, input: Box<dyn InputEvent>, reply: ReplySender) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let input = unpack(input)?;
            let pong = Pong {
                id: valet::entity::new_id(),
                session_id: input.session_id,
                text: input.body.text,
            };
            match &self.behavior {
                Behavior::Echo => reply.send_entity(pong),
                Behavior::Empty => reply.send_empty(),
                Behavior::Slow(d) => {
                    may::coroutine::sleep(*d);
                    reply.send_entity(pong);
                }
                Behavior::Silent(d) => {
                    may::coroutine::sleep(*d);
                    drop(reply);
                }
                Behavior::Parked(gate) => {
                    gate.wait();
                    reply.send_entity(pong);
                }
                Behavior::Fail => {
                    drop(reply);
                    return Err(HandlerError::Failed("stub failure".into()));
                }
                Behavior::Panic => panic!("stub handler panic"),
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
