use axum::http::StatusCode;
use field_dispatch::AppError;

#[test]
fn display_uses_kind_prefix() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Db("locked".into()), "db: locked"),
        (AppError::Io("eof".into()), "io: eof"),
        (AppError::NotFound("client 1".into()), "not found: client 1"),
        (AppError::Unauthorized("no id".into()), "unauthorized: no id"),
        (AppError::Forbidden("agents".into()), "forbidden: agents"),
        (
            AppError::InvalidTransition("a to b".into()),
            "invalid transition: a to b",
        ),
        (AppError::TerminalState("done".into()), "terminal state: done"),
        (AppError::AgentUnavailable("busy".into()), "agent unavailable: busy"),
        (AppError::ClientNotPending("taken".into()), "client not pending: taken"),
        (AppError::MalformedInput("json".into()), "malformed input: json"),
        (AppError::Closed("hub".into()), "closed: hub"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn sqlx_errors_map_to_db() {
    let err = AppError::from(sqlx::Error::RowNotFound);
    assert!(matches!(err, AppError::Db(_)));
}

#[test]
fn json_errors_map_to_malformed_input() {
    let err = AppError::from(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
    assert!(matches!(err, AppError::MalformedInput(_)));
}

#[test]
fn http_status_codes() {
    let cases = [
        (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
        (AppError::Unauthorized(String::new()), StatusCode::UNAUTHORIZED),
        (AppError::Forbidden(String::new()), StatusCode::FORBIDDEN),
        (AppError::InvalidTransition(String::new()), StatusCode::CONFLICT),
        (AppError::TerminalState(String::new()), StatusCode::CONFLICT),
        (AppError::AgentUnavailable(String::new()), StatusCode::CONFLICT),
        (AppError::ClientNotPending(String::new()), StatusCode::CONFLICT),
        (AppError::MalformedInput(String::new()), StatusCode::BAD_REQUEST),
        (AppError::Closed(String::new()), StatusCode::SERVICE_UNAVAILABLE),
        (AppError::Db(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        (AppError::Config(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        (AppError::Io(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
    ];

    for (err, expected) in cases {
        assert_eq!(err.status_code(), expected, "{err}");
    }
}
