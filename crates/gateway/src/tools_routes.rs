//! Tool listing and invocation routes.

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde_json::{Value, json},
    tracing::{debug, error, warn},
};

use crate::server::AppState;

/// `GET /tools`: every registered tool's name, description and parameter schema.
pub async fn list_tools_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(Value::Array(state.tools.list_schemas()))
}

/// `POST /tools/{name}`: run a tool with the JSON body as its parameters.
///
/// An empty body is treated as `{}`.
pub async fn invoke_tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let Some(tool) = state.tools.get(&name) else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown tool: {name}"));
    };

    let params: Value = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}"));
            },
        }
    };

    debug!(tool = %name, "invoking tool");
    match tool.execute(params).await {
        Ok(result) => Json(json!({ "result": result })).into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                error!(tool = %name, error = %e, "tool failed");
            } else {
                warn!(tool = %name, error = %e, "tool rejected request");
            }
            error_response(status, e.to_string())
        },
    }
}

/// Storage failures are the server's fault; everything else is the caller's.
fn error_status(err: &anyhow::Error) -> StatusCode {
    match err.downcast_ref::<tasklane_cron::Error>() {
        Some(cron_err) if !cron_err.is_validation() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_server_errors() {
        let io = tasklane_cron::Error::Io(std::io::Error::other("disk full"));
        assert_eq!(
            error_status(&anyhow::Error::from(io)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn other_errors_are_client_errors() {
        let validation = tasklane_cron::Error::EmptyPrompt;
        assert_eq!(
            error_status(&anyhow::Error::from(validation)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&anyhow::anyhow!("missing 'prompt' parameter")),
            StatusCode::BAD_REQUEST
        );
    }
}
