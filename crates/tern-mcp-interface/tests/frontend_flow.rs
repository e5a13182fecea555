//! End-to-end flows through the interface frontend: parse declarations,
//! lower into the kernel, and dispatch MCP methods against the result.

use serde_json::json;

use tern_mcp_builders::config::HandlerMap;
use tern_mcp_interface::{lower_model, parse_interface_source};
use tern_mcp_json_rpc_server::{JsonRpcMessage, JsonRpcRequest, SessionContext};
use tern_mcp_server::{McpServer, ToolOutput};

const SOURCE: &str = r##"
/// Weather demo.
#[server(name = "weather-server", version = "1.0.0")]
struct WeatherServer;

enum Units { Celsius, Fahrenheit }

/// Current temperature for a location.
#[tool(name = "get_temperature", result = "number")]
struct GetTemperature {
    location: String,
    units: Option<Units>,
}

#[prompt(name = "weather_report", template = "Report for {location}. {include_extended ? 'Extended.' : '3-day.'}")]
struct WeatherReport {
    location: String,
    include_extended: Option<bool>,
}

#[resource(uri = "stats://search", mime = "application/json", dynamic)]
struct SearchStats;

#[ui(uri = "ui://calculator", source = "<div id='calc'></div>", tools(get_temperature))]
struct CalculatorUi;
"##;

fn build_server() -> McpServer {
    let model = parse_interface_source(SOURCE).unwrap();
    let handlers = HandlerMap::new()
        .tool("get_temperature", |args, _ctx| async move {
            let location = args["location"].as_str().unwrap_or_default();
            Ok(ToolOutput::text(format!("21.5 in {location}")))
        })
        .resource("stats://search", |_ctx| async {
            Ok(json!({
                "queries": 12,
                "lastUpdated": std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_nanos()
                    .to_string()
            }))
        });
    lower_model(model, handlers).unwrap()
}

async fn dispatch(server: &McpServer, id: i64, method: &str, params: serde_json::Value) -> JsonRpcMessage {
    let dispatcher = server.rpc_dispatcher();
    let session = server.sessions().create();
    let mut request = JsonRpcRequest::new(id, method);
    if let serde_json::Value::Object(map) = params {
        request = request.with_params(
            map.into_iter()
                .collect::<std::collections::HashMap<_, _>>(),
        );
    }
    dispatcher
        .dispatch(request, Some(SessionContext::new(session.id())))
        .await
}

#[tokio::test]
async fn initialize_reflects_declared_capabilities() {
    let server = build_server();
    let reply = dispatch(&server, 1, "initialize", json!({})).await;
    let JsonRpcMessage::Response(response) = reply else {
        panic!("expected success");
    };
    assert_eq!(response.result["serverInfo"]["name"], "weather-server");
    assert!(response.result["capabilities"]["tools"].is_object());
    assert!(response.result["capabilities"]["resources"].is_object());
    assert!(response.result["capabilities"]["ui"].is_object());
}

#[tokio::test]
async fn tool_call_enum_validation_path() {
    let server = build_server();

    // Out-of-enum value rejected with invalid-params citing the field
    let reply = dispatch(
        &server,
        2,
        "tools/call",
        json!({"name": "get_temperature", "arguments": {"location": "Paris", "units": "kelvin"}}),
    )
    .await;
    let JsonRpcMessage::Error(err) = reply else {
        panic!("expected invalid-params error");
    };
    assert_eq!(err.error.code, -32602);
    assert!(err.error.message.contains("units"));

    // Valid arguments reach the handler; output normalized to text
    let reply = dispatch(
        &server,
        3,
        "tools/call",
        json!({"name": "get_temperature", "arguments": {"location": "Paris"}}),
    )
    .await;
    let JsonRpcMessage::Response(response) = reply else {
        panic!("expected success");
    };
    assert_eq!(
        response.result["content"][0]["text"],
        "21.5 in Paris"
    );
}

#[tokio::test]
async fn static_prompt_interpolation() {
    let server = build_server();

    let reply = dispatch(
        &server,
        4,
        "prompts/get",
        json!({"name": "weather_report", "arguments": {"location": "Tokyo", "include_extended": true}}),
    )
    .await;
    let JsonRpcMessage::Response(response) = reply else {
        panic!("expected success");
    };
    assert_eq!(
        response.result["messages"][0]["content"]["text"],
        "Report for Tokyo. Extended."
    );

    // Missing required argument is invalid-params
    let reply = dispatch(
        &server,
        5,
        "prompts/get",
        json!({"name": "weather_report", "arguments": {}}),
    )
    .await;
    let JsonRpcMessage::Error(err) = reply else {
        panic!("expected error");
    };
    assert_eq!(err.error.code, -32602);
}

#[tokio::test]
async fn dynamic_resource_fresh_per_read() {
    let server = build_server();
    let first = dispatch(&server, 6, "resources/read", json!({"uri": "stats://search"})).await;
    let second = dispatch(&server, 7, "resources/read", json!({"uri": "stats://search"})).await;
    let (JsonRpcMessage::Response(a), JsonRpcMessage::Response(b)) = (first, second) else {
        panic!("expected successes");
    };
    assert_ne!(
        a.result["contents"][0]["text"],
        b.result["contents"][0]["text"]
    );
}

#[tokio::test]
async fn ui_resource_readable_with_html_mime() {
    let server = build_server();
    let reply = dispatch(&server, 8, "resources/read", json!({"uri": "ui://calculator"})).await;
    let JsonRpcMessage::Response(response) = reply else {
        panic!("expected success");
    };
    assert_eq!(response.result["contents"][0]["mimeType"], "text/html");
    assert!(
        response.result["contents"][0]["text"]
            .as_str()
            .unwrap()
            .contains("calc")
    );
}

#[tokio::test]
async fn ui_whitelist_missing_tool_fails_start() {
    let source = r##"
#[server(name = "broken", version = "0.0.1")]
struct Broken;

#[ui(uri = "ui://calculator", source = "<div/>", tools(add, subtract))]
struct CalculatorUi;
"##;
    let model = parse_interface_source(source).unwrap();
    let server = lower_model(model, HandlerMap::new()).unwrap();

    // Registration succeeded; start-time cross-validation fails, naming
    // the missing whitelisted tools.
    let err = server
        .start(tern_mcp_server::TransportKind::Stdio)
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("add"));
    assert!(message.contains("subtract"));
}
