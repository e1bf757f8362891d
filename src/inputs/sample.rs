//! Reference input: a JSON body `{ "Name": string, "Number": int }`.
//!
//! [`from_http_request`] is the converter to register on a route and
//! [`EchoHandler`] answers it by echoing the contents back with the session
//! id, which is enough to exercise the full session/dispatch path.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::dispatcher::{
    parse_input, ConvertError, Handler, HandlerError, InputContext, InputEvent, ReplySender,
};
use crate::entity::{self, Entity};
use crate::securecookie::Serializer;
use crate::server::{HttpRequest, HttpResponse, RequestHead};

pub const TYPE_ID: &str = "2BE17DF8BBCD43FB8FE53811AED9986D";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contents {
    #[serde(default, alias = "name")]
    pub name: String,
    #[serde(default, alias = "number")]
    pub number: i64,
}

/// One decoded sample request.
#[derive(Debug)]
pub struct Payload {
    pub id: String,
    pub session_id: String,
    pub contents: Contents,
    request: RequestHead,
}

impl InputEvent for Payload {
    fn input_type_id(&self) -> &str {
        TYPE_ID
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn request(&self) -> &RequestHead {
        &self.request
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Converter for the sample route.
///
/// # Errors
///
/// Whatever [`parse_input`] reports.
pub fn from_http_request<S: Serializer>(
    req: &HttpRequest,
    res: &mut HttpResponse,
    ctx: &InputContext<S>,
) -> Result<Box<dyn InputEvent>, ConvertError> {
    let (contents, session) = parse_input::<Contents, _>(req, res, ctx)?;
    Ok(Box::new(Payload {
        id: entity::new_id(),
        session_id: session.id,
        contents,
        request: RequestHead::from_request(req),
    }))
}

/// Reply entity of [`EchoHandler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Echo {
    pub id: String,
    pub session_id: String,
    pub contents: Contents,
}

impl Entity for Echo {
    const TYPE_ID: &'static str = TYPE_ID;

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Replies with the request's contents and session id.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn input_type_id(&self) -> &str {
        TYPE_ID
    }

    fn notify(&self, input: Box<dyn InputEvent>, reply: ReplySender) -> Result<(), HandlerError> {
        let payload = input
            .into_any()
            .downcast::<Payload>()
            .map_err(|_| HandlerError::UnexpectedInput {
                expected: TYPE_ID.to_owned(),
            })?;
        reply.send_entity(Echo {
            id: payload.id,
            session_id: payload.session_id,
            contents: payload.contents,
        });
        Ok(())
    }
}
