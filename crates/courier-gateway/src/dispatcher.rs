use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task;
use tracing::{debug, error};

use courier_api::mailbox::Outgoing;
use courier_api::{AppState, AppStateInner, auth, conversations, mailbox, presence};
use courier_types::api::{
    Credentials, ErrorCode, PeerRequest, Request, Response, SearchRequest, SendFileRequest,
    SendRequest, TypingRequest,
};

/// Every action the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Register,
    Login,
    Send,
    SendFile,
    Inbox,
    Conversations,
    ConversationDetail,
    DeleteConversation,
    Search,
    Typing,
    TypingStatus,
}

impl Action {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "register" => Self::Register,
            "login" => Self::Login,
            "send" => Self::Send,
            "send_file" => Self::SendFile,
            "inbox" => Self::Inbox,
            "conversations" => Self::Conversations,
            "conversation_detail" => Self::ConversationDetail,
            "delete_conversation" => Self::DeleteConversation,
            "search" => Self::Search,
            "typing" => Self::Typing,
            "typing_status" => Self::TypingStatus,
            _ => return None,
        })
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::Register | Self::Login)
    }
}

/// Routes requests to the auth, mailbox, conversation and presence layers.
#[derive(Clone)]
pub struct Dispatcher {
    state: AppState,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle one request on the blocking pool. Store work always runs to
    /// completion even if the caller goes away.
    pub async fn dispatch(&self, req: Request) -> Response {
        let state = self.state.clone();
        match task::spawn_blocking(move || handle(&state, req)).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("spawn_blocking join error: {}", e);
                Response::error(ErrorCode::InternalError)
            }
        }
    }
}

/// Synchronous request handling.
pub fn handle(state: &AppStateInner, req: Request) -> Response {
    let Some(action) = Action::parse(&req.action) else {
        debug!("Unknown action '{}'", req.action);
        return Response::error(ErrorCode::UnknownAction);
    };

    let caller = state.sessions.authenticate(req.username.as_deref());
    if action.requires_auth() && caller.is_none() {
        debug!("{:?} rejected: no session for {:?}", action, req.username);
        return Response::error(ErrorCode::NotLoggedIn);
    }
    let user = caller.unwrap_or_default();
    debug!("{:?} from {:?}", action, caller);

    let result = match action {
        Action::Register => register(state, req.data),
        Action::Login => login(state, req.data),
        Action::Send => send(state, user, req.data),
        Action::SendFile => send_file(state, user, req.data),
        Action::Inbox => mailbox::fetch_inbox(state, user)
            .map(|messages| Response::ok().with("messages", messages))
            .map_err(|e| internal(&e)),
        Action::Conversations => conversations::summarize(state, user)
            .map(|rows| Response::ok().with("conversations", rows))
            .map_err(|e| internal(&e)),
        Action::ConversationDetail => payload::<PeerRequest>(req.data).and_then(|p| {
            conversations::conversation_detail(state, user, &p.peer)
                .map(|history| Response::ok().with("history", history))
                .map_err(|e| query_failure(e.code(), &e))
        }),
        Action::DeleteConversation => payload::<PeerRequest>(req.data).and_then(|p| {
            mailbox::delete_conversation(state, user, &p.peer)
                .map(|removed| Response::ok().with("removed", removed))
                .map_err(|e| query_failure(e.code(), &e))
        }),
        Action::Search => payload::<SearchRequest>(req.data).and_then(|p| {
            conversations::search(state, user, &p.query)
                .map(|results| Response::ok().with("results", results))
                .map_err(|e| query_failure(e.code(), &e))
        }),
        Action::Typing => payload::<TypingRequest>(req.data).and_then(|p| {
            presence::set_typing(state, user, &p.peer, p.is_typing)
                .map(|()| Response::ok())
                .map_err(|e| query_failure(e.code(), &e))
        }),
        Action::TypingStatus => payload::<PeerRequest>(req.data).and_then(|p| {
            presence::get_typing(state, user, &p.peer)
                .map(|typing| Response::ok().with("typing", typing))
                .map_err(|e| query_failure(e.code(), &e))
        }),
    };

    result.unwrap_or_else(|resp| resp)
}

fn register(state: &AppStateInner, data: Value) -> Result<Response, Response> {
    let creds = payload::<Credentials>(data)?;
    auth::register(state, &creds.user, &creds.pw)
        .map(|()| Response::ok())
        .map_err(|e| query_failure(e.code(), &e))
}

fn login(state: &AppStateInner, data: Value) -> Result<Response, Response> {
    let creds = payload::<Credentials>(data)?;
    auth::login(state, &creds.user, &creds.pw)
        .map(|()| Response::ok())
        .map_err(|e| {
            let resp = query_failure(e.code(), &e);
            match e.strike() {
                Some(strike) => resp.with("strike", strike),
                None => resp,
            }
        })
}

fn send(state: &AppStateInner, user: &str, data: Value) -> Result<Response, Response> {
    let req = payload::<SendRequest>(data)?;
    mailbox::deliver(state, user, &req.to, Outgoing::Text(&req.msg))
        .map(|()| Response::ok())
        .map_err(|e| query_failure(e.code(), &e))
}

fn send_file(state: &AppStateInner, user: &str, data: Value) -> Result<Response, Response> {
    let req = payload::<SendFileRequest>(data)?;
    let outgoing = Outgoing::File {
        filename: &req.filename,
        content: &req.content,
    };
    mailbox::deliver(state, user, &req.to, outgoing)
        .map(|()| Response::ok())
        .map_err(|e| query_failure(e.code(), &e))
}

/// Decode `data` into an action payload. Absent data reads as all-empty fields.
fn payload<T: DeserializeOwned + Default>(data: Value) -> Result<T, Response> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| {
        debug!("{}", describe_payload_error::<T>(&e));
        Response::error(ErrorCode::MissingFields)
    })
}

/// Log text for a payload that failed to decode. The serde message can quote
/// field values, so only the target type and error category are kept.
fn describe_payload_error<T>(err: &serde_json::Error) -> String {
    let name = std::any::type_name::<T>();
    let name = name.rsplit("::").next().unwrap_or(name);
    format!("Malformed {} payload ({:?})", name, err.classify())
}

fn query_failure(code: ErrorCode, err: &dyn std::error::Error) -> Response {
    if code == ErrorCode::InternalError {
        error!("Request failed: {}", err);
    } else {
        debug!("Request refused ({}): {}", code, err);
    }
    Response::error(code)
}

fn internal(err: &dyn std::error::Error) -> Response {
    query_failure(ErrorCode::InternalError, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use argon2::Params;
    use serde_json::json;

    use courier_api::auth::AuthPolicy;
    use courier_crypto::{MessageCipher, keys::generate_key};
    use courier_db::Store;

    fn state() -> AppState {
        let path = std::env::temp_dir()
            .join(format!("courier_dispatch_{}", uuid::Uuid::new_v4()))
            .join("db.json");
        let policy = AuthPolicy {
            hash_params: Params::new(8, 1, 1, None).unwrap(),
            ..AuthPolicy::default()
        };
        Arc::new(
            AppStateInner::new(Store::open(&path).unwrap(), MessageCipher::new(generate_key()))
                .with_policy(policy),
        )
    }

    fn call(state: &AppStateInner, action: &str, user: Option<&str>, data: Value) -> Value {
        let req = Request {
            action: action.to_string(),
            username: user.map(str::to_string),
            data,
        };
        serde_json::to_value(handle(state, req)).unwrap()
    }

    fn join(state: &AppStateInner, user: &str) {
        let creds = json!({ "user": user, "pw": "secret1" });
        assert_eq!(call(state, "register", None, creds.clone())["ok"], json!(true));
        assert_eq!(call(state, "login", None, creds)["ok"], json!(true));
    }

    #[test]
    fn unknown_action() {
        let state = state();
        let resp = call(&state, "dance", Some("erika"), json!({}));
        assert_eq!(resp, json!({ "ok": false, "error": "unknown_action" }));
    }

    #[test]
    fn register_errors_map_to_codes() {
        let state = state();
        assert_eq!(call(&state, "register", None, Value::Null)["error"], json!("missing_fields"));
        assert_eq!(
            call(&state, "register", None, json!({ "user": "erika", "pw": "123" }))["error"],
            json!("pw_too_short")
        );
        join(&state, "erika");
        assert_eq!(
            call(&state, "register", None, json!({ "user": "erika", "pw": "secret1" }))["error"],
            json!("user_exists")
        );
    }

    #[test]
    fn login_reports_strikes() {
        let state = state();
        join(&state, "erika");
        let bad = json!({ "user": "erika", "pw": "wrong" });

        let r1 = call(&state, "login", None, bad.clone());
        assert_eq!((r1["error"].clone(), r1["strike"].clone()), (json!("bad_credentials"), json!(1)));
        let r2 = call(&state, "login", None, bad.clone());
        assert_eq!(r2["strike"], json!(2));
        let r3 = call(&state, "login", None, bad.clone());
        assert_eq!((r3["error"].clone(), r3["strike"].clone()), (json!("locked_after_3"), json!(3)));
        let r4 = call(&state, "login", None, bad);
        assert_eq!(r4["error"], json!("locked_out"));
        assert!(r4.get("strike").is_none());

        assert_eq!(
            call(&state, "login", None, json!({ "user": "ghost", "pw": "x" }))["error"],
            json!("no_such_user")
        );
    }

    #[test]
    fn gated_actions_need_a_session() {
        let state = state();
        assert_eq!(call(&state, "inbox", None, Value::Null)["error"], json!("not_logged_in"));

        let creds = json!({ "user": "erika", "pw": "secret1" });
        call(&state, "register", None, creds);
        assert_eq!(
            call(&state, "inbox", Some("erika"), Value::Null)["error"],
            json!("not_logged_in")
        );
    }

    #[test]
    fn messaging_flow() {
        let state = state();
        join(&state, "erika");
        join(&state, "sam");

        let sent = call(&state, "send", Some("erika"), json!({ "to": "sam", "msg": "lunch?" }));
        assert_eq!(sent["ok"], json!(true));
        assert_eq!(
            call(&state, "send", Some("erika"), json!({ "to": "ghost", "msg": "hi" }))["error"],
            json!("no_such_user")
        );
        assert_eq!(
            call(&state, "send", Some("erika"), json!({ "to": "sam" }))["error"],
            json!("missing_fields")
        );

        let inbox = call(&state, "inbox", Some("sam"), Value::Null);
        let messages = inbox["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["from"], json!("erika"));
        assert_eq!(messages[0]["msg"], json!("lunch?"));
        assert_eq!(messages[0]["kind"], json!("text"));

        let convs = call(&state, "conversations", Some("sam"), Value::Null);
        assert_eq!(convs["conversations"][0]["peer"], json!("erika"));
        assert_eq!(convs["conversations"][0]["last_preview"], json!("lunch?"));

        let detail = call(&state, "conversation_detail", Some("erika"), json!({ "peer": "sam" }));
        assert_eq!(detail["history"][0]["to"], json!("sam"));
        assert_eq!(detail["history"][0]["filename"], Value::Null);

        let hits = call(&state, "search", Some("erika"), json!({ "query": "LUNCH" }));
        assert_eq!(hits["results"].as_array().unwrap().len(), 1);
        assert_eq!(
            call(&state, "search", Some("erika"), json!({ "query": "" }))["error"],
            json!("empty_query")
        );

        let deleted = call(&state, "delete_conversation", Some("sam"), json!({ "peer": "erika" }));
        assert_eq!(deleted["removed"], json!(1));
        assert_eq!(
            call(&state, "delete_conversation", Some("sam"), json!({}))["error"],
            json!("missing_peer")
        );
    }

    #[test]
    fn file_flow() {
        let state = state();
        join(&state, "erika");
        join(&state, "sam");

        let ok = call(
            &state,
            "send_file",
            Some("erika"),
            json!({ "to": "sam", "filename": "milk.txt", "content_b64": "bWlsaw==" }),
        );
        assert_eq!(ok["ok"], json!(true));
        let bad = call(
            &state,
            "send_file",
            Some("erika"),
            json!({ "to": "sam", "filename": "x", "content": "***" }),
        );
        assert_eq!(bad["error"], json!("invalid_content"));

        let detail = call(&state, "conversation_detail", Some("sam"), json!({ "peer": "erika" }));
        assert_eq!(detail["history"][0]["kind"], json!("file"));
        assert_eq!(detail["history"][0]["filename"], json!("milk.txt"));

        let hits = call(&state, "search", Some("sam"), json!({ "query": "milk" }));
        assert!(hits["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn typing_round_trip() {
        let state = state();
        join(&state, "erika");
        join(&state, "sam");

        let set = call(&state, "typing", Some("erika"), json!({ "peer": "sam", "is_typing": true }));
        assert_eq!(set["ok"], json!(true));

        let seen = call(&state, "typing_status", Some("sam"), json!({ "peer": "erika" }));
        assert_eq!(seen["typing"], json!(true));
        let reverse = call(&state, "typing_status", Some("erika"), json!({ "peer": "sam" }));
        assert_eq!(reverse["typing"], json!(false));

        assert_eq!(
            call(&state, "typing_status", Some("sam"), Value::Null)["error"],
            json!("missing_peer")
        );
        assert_eq!(
            call(&state, "typing", Some("erika"), json!({ "peer": "ghost", "is_typing": true }))["error"],
            json!("no_such_user")
        );
    }

    #[test]
    fn mistyped_payload_reads_as_missing_fields() {
        let state = state();
        let resp = call(&state, "register", None, json!({ "user": "erika", "pw": 12345678 }));
        assert_eq!(resp, json!({ "ok": false, "error": "missing_fields" }));

        let err = serde_json::from_value::<Credentials>(json!({ "user": "erika", "pw": 12345678 }))
            .unwrap_err();
        let line = describe_payload_error::<Credentials>(&err);
        assert_eq!(line, "Malformed Credentials payload (Data)");
        assert!(!line.contains("12345678"));
    }

    #[test]
    fn action_table() {
        assert_eq!(Action::parse("send_file"), Some(Action::SendFile));
        assert_eq!(Action::parse("Send"), None);
        assert!(!Action::Login.requires_auth());
        assert!(Action::TypingStatus.requires_auth());
    }
}
