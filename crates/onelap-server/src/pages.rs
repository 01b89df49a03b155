//! HTTP page handlers: the server status page and the per-session
//! dashboard. Thin collaborators around the WebSocket core.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};

use onelap_core::ids::SessionId;

/// Shareable locator for a session's dashboard. Pure string construction:
/// the id's restricted character set needs no escaping.
pub fn dashboard_url(base: &str, session_id: &SessionId) -> String {
    format!("{base}/dashboard/{session_id}")
}

/// Home page: server status.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Dashboard page for one session. The id is parsed strictly before it
/// is embedded in the page.
pub async fn dashboard(Path(session_id): Path<String>) -> impl IntoResponse {
    match SessionId::parse(&session_id) {
        Ok(id) => Html(DASHBOARD_HTML.replace("__SESSION_ID__", &id.to_string())).into_response(),
        Err(e) => {
            tracing::debug!(session_id = %session_id, error = %e, "Rejected dashboard request");
            (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML)).into_response()
        }
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>1Lap Race Dashboard Server</title>
    <style>
      body {
        font-family: Arial, sans-serif;
        max-width: 800px;
        margin: 50px auto;
        padding: 20px;
        background-color: #f5f5f5;
      }
      h1 { color: #333; }
      .info {
        background-color: white;
        padding: 20px;
        border-radius: 5px;
        box-shadow: 0 2px 5px rgba(0,0,0,0.1);
      }
    </style>
  </head>
  <body>
    <h1>1Lap Race Dashboard Server</h1>
    <div class="info">
      <p>Server is running and waiting for monitor connections...</p>
      <p>Dashboard URLs will be generated when a monitor connects.</p>
    </div>
  </body>
</html>
"#;

const NOT_FOUND_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>1Lap Race Dashboard</title></head>
  <body>
    <h1>Unknown session</h1>
    <p>That dashboard link is not valid. Check the URL from your monitor.</p>
  </body>
</html>
"#;

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>1Lap Race Dashboard</title>
    <style>
      body {
        font-family: Arial, sans-serif;
        max-width: 800px;
        margin: 50px auto;
        padding: 20px;
        background-color: #f5f5f5;
      }
      h1 { color: #333; }
      .card {
        background-color: white;
        padding: 20px;
        margin-bottom: 20px;
        border-radius: 5px;
        box-shadow: 0 2px 5px rgba(0,0,0,0.1);
      }
      .session { color: #888; font-size: 0.85em; }
      pre { overflow-x: auto; }
      #status.live { color: #2a7a2a; }
      #status.offline { color: #a33; }
    </style>
  </head>
  <body>
    <h1>Race Dashboard</h1>
    <p class="session">Session __SESSION_ID__ &mdash; <span id="status" class="offline">connecting...</span></p>
    <div class="card">
      <h2>Telemetry</h2>
      <pre id="telemetry">Waiting for telemetry...</pre>
    </div>
    <div class="card">
      <h2>Car Setup</h2>
      <p class="session" id="setup-timestamp"></p>
      <pre id="setup">No setup received yet.</pre>
    </div>
    <script>
      const SESSION_ID = "__SESSION_ID__";
      const scheme = location.protocol === "https:" ? "wss" : "ws";
      const ws = new WebSocket(`${scheme}://${location.host}/ws`);
      const el = (id) => document.getElementById(id);

      ws.onopen = () => {
        el("status").textContent = "live";
        el("status").className = "live";
        ws.send(JSON.stringify({ event: "join_session", data: { session_id: SESSION_ID } }));
      };
      ws.onclose = () => {
        el("status").textContent = "disconnected";
        el("status").className = "offline";
      };
      ws.onmessage = (msg) => {
        const { event, data } = JSON.parse(msg.data);
        if (event === "telemetry_update") {
          el("telemetry").textContent = JSON.stringify(data.telemetry, null, 2);
        } else if (event === "setup_update") {
          el("setup-timestamp").textContent = `Received ${data.timestamp}`;
          el("setup").textContent = JSON.stringify(data.setup, null, 2);
        }
      };
    </script>
  </body>
</html>
"#;
