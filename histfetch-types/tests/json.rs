use histfetch_types::{
    AuthorizationState, Function, Object, TdlibParameters, decode_response, encode_request,
};

// ── Requests ──────────────────────────────────────────────────────────────────

#[test]
fn request_carries_type_and_extra() {
    let line = encode_request(7, &Function::CheckAuthenticationCode { code: "12345".into() }).unwrap();
    let v: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(v["@type"], "checkAuthenticationCode");
    assert_eq!(v["code"], "12345");
    assert_eq!(v["@extra"], 7);
}

#[test]
fn newtype_parameters_are_flattened() {
    let params = TdlibParameters {
        database_directory: "db".into(),
        api_id: 42,
        ..Default::default()
    };
    let line = encode_request(1, &Function::SetTdlibParameters(params)).unwrap();
    let v: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(v["@type"], "setTdlibParameters");
    assert_eq!(v["database_directory"], "db");
    assert_eq!(v["api_id"], 42);
}

#[test]
fn history_request_fields() {
    let f = Function::GetChatHistory {
        chat_id: -100, from_message_id: 55, offset: 0, limit: 100, only_local: false,
    };
    assert_eq!(f.kind(), "getChatHistory");
    let v: serde_json::Value = serde_json::from_str(&encode_request(3, &f).unwrap()).unwrap();
    assert_eq!(v["from_message_id"], 55);
    assert_eq!(v["only_local"], false);
}

// ── Responses ─────────────────────────────────────────────────────────────────

#[test]
fn response_without_extra_is_an_event() {
    let (id, obj) = decode_response(
        r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateWaitPhoneNumber"}}"#,
    ).unwrap();
    assert_eq!(id, 0);
    assert_eq!(obj, Object::UpdateAuthorizationState {
        authorization_state: AuthorizationState::WaitPhoneNumber,
    });
}

#[test]
fn unit_state_ignores_extra_fields() {
    let (_, obj) = decode_response(
        r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateWaitCode","code_info":{"@type":"authenticationCodeInfo","timeout":60}}}"#,
    ).unwrap();
    match obj {
        Object::UpdateAuthorizationState { authorization_state } =>
            assert_eq!(authorization_state, AuthorizationState::WaitCode),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn confirmation_link_is_kept() {
    let (_, obj) = decode_response(
        r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateWaitOtherDeviceConfirmation","link":"tg://login?token=abc"}}"#,
    ).unwrap();
    let Object::UpdateAuthorizationState { authorization_state } = obj else { panic!("not a state update") };
    assert_eq!(authorization_state, AuthorizationState::WaitOtherDeviceConfirmation {
        link: "tg://login?token=abc".into(),
    });
}

#[test]
fn unknown_kinds_do_not_fail() {
    let (id, obj) = decode_response(r#"{"@type":"updateUserStatus","user_id":1,"@extra":0}"#).unwrap();
    assert_eq!(id, 0);
    assert_eq!(obj, Object::Unknown);

    let (_, obj) = decode_response(
        r#"{"@type":"updateAuthorizationState","authorization_state":{"@type":"authorizationStateSomethingNew"}}"#,
    ).unwrap();
    assert_eq!(obj, Object::UpdateAuthorizationState { authorization_state: AuthorizationState::Unknown });
}

#[test]
fn error_response_is_correlated() {
    let (id, obj) = decode_response(
        r#"{"@type":"error","code":400,"message":"PHONE_CODE_INVALID","@extra":12}"#,
    ).unwrap();
    assert_eq!(id, 12);
    assert!(obj.is_error());
}

#[test]
fn messages_page_decodes() {
    let (id, obj) = decode_response(r#"{
        "@type":"messages","total_count":2,"@extra":9,
        "messages":[
            {"@type":"message","id":20,"chat_id":-5,"date":100,
             "sender_id":{"@type":"messageSenderUser","user_id":77},
             "content":{"@type":"messageText","text":{"@type":"formattedText","text":"hi"}}},
            {"@type":"message","id":10,"chat_id":-5,"date":90,
             "reply_to":{"@type":"messageReplyToMessage","chat_id":-5,"message_id":3},
             "sender_id":{"@type":"messageSenderChat","chat_id":-5}}
        ]}"#).unwrap();
    assert_eq!(id, 9);
    let Object::Messages(page) = obj else { panic!("not messages") };
    assert_eq!(page.messages.len(), 2);
    assert_eq!(page.messages[1].id, 10);
    assert_eq!(page.messages[0].content["text"]["text"], "hi");
}

#[test]
fn malformed_line_is_an_error() {
    let err = decode_response("{not json").unwrap_err();
    assert_eq!(err.request_id, 0);
}

#[test]
fn broken_body_keeps_its_request_id() {
    let err = decode_response(
        r#"{"@type":"messages","@extra":9,"total_count":1,"messages":[{"@type":"message","id":"not-a-number"}]}"#,
    ).unwrap_err();
    assert_eq!(err.request_id, 9);
    assert!(err.to_string().contains("#9"));
}

#[test]
fn broken_event_has_no_request_id() {
    let err = decode_response(r#"{"@type":"updateNewChat","chat":{"id":"x"}}"#).unwrap_err();
    assert_eq!(err.request_id, 0);
}
