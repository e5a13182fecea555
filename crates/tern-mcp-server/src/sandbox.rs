//! Code execution sandbox
//!
//! When code execution is enabled the kernel auto-registers the
//! `tool_runner` meta-tool. Execution runs in an isolated JS engine
//! (feature `sandbox`, backed by boa) with a fresh context per call, a
//! wall-clock timeout, captured console output, and optional host-tool
//! re-exposure. Without the feature, the runner reports the missing backend
//! as a structured `{ success: false, error }` outcome. Container mode is a
//! declared policy variant that probes for an OS-level runtime; it is not
//! part of the default build.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tern_mcp_protocol::schema::{JsonSchema, ObjectSchema};

use crate::context::ToolCatalog;

/// Name of the auto-registered meta-tool
pub const TOOL_RUNNER_NAME: &str = "tool_runner";

/// Default wall-clock timeout
pub const DEFAULT_SANDBOX_TIMEOUT: Duration = Duration::from_secs(5);
/// Default memory cap
pub const DEFAULT_MEMORY_LIMIT: u64 = 128 * 1024 * 1024;

/// Source language accepted by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Typescript,
    Javascript,
}

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxMode {
    /// Fresh in-process JS engine per call
    #[default]
    Isolated,
    /// Ephemeral OS container (probed at call time, off the default build)
    Container,
}

/// Resource policy for sandboxed execution
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    pub timeout: Duration,
    pub memory_limit: u64,
    /// Re-expose registered host tools as callable stubs
    pub expose_tools: bool,
    pub mode: SandboxMode,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SANDBOX_TIMEOUT,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            expose_tools: false,
            mode: SandboxMode::Isolated,
        }
    }
}

/// `tool_runner` input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub language: Language,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// `tool_runner` structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Value>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Milliseconds spent executing
    pub execution_time: u64,
}

impl SandboxOutcome {
    fn failure(error: impl Into<String>, stdout: String, stderr: String, elapsed: u64) -> Self {
        Self {
            success: false,
            return_value: None,
            stdout,
            stderr,
            error: Some(error.into()),
            stack_trace: None,
            execution_time: elapsed,
        }
    }
}

/// The `tool_runner` input schema
pub fn tool_runner_schema() -> ObjectSchema {
    ObjectSchema::new()
        .property(
            "language",
            JsonSchema::string_enum(vec!["typescript".to_string(), "javascript".to_string()]),
            true,
        )
        .property(
            "code",
            JsonSchema::string().with_description("Source code to execute"),
            true,
        )
        .property(
            "timeout_ms",
            JsonSchema::integer().with_minimum(1.0),
            false,
        )
}

/// Execute a sandbox request under the policy
pub async fn execute(
    request: SandboxRequest,
    policy: &SandboxPolicy,
    catalog: Option<&ToolCatalog>,
) -> SandboxOutcome {
    if matches!(policy.mode, SandboxMode::Container) {
        return SandboxOutcome::failure(
            "container mode is not available in this build: no container runtime backend \
             is compiled in",
            String::new(),
            String::new(),
            0,
        );
    }

    let timeout = request
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(policy.timeout);

    let code = match request.language {
        Language::Typescript => strip_type_annotations(&request.code),
        Language::Javascript => request.code.clone(),
    };

    run_isolated(code, timeout, policy, catalog).await
}

#[cfg(not(feature = "sandbox"))]
async fn run_isolated(
    _code: String,
    _timeout: Duration,
    _policy: &SandboxPolicy,
    _catalog: Option<&ToolCatalog>,
) -> SandboxOutcome {
    SandboxOutcome::failure(
        "code execution backend missing: rebuild with the 'sandbox' feature (boa engine)",
        String::new(),
        String::new(),
        0,
    )
}

#[cfg(feature = "sandbox")]
async fn run_isolated(
    code: String,
    timeout: Duration,
    policy: &SandboxPolicy,
    catalog: Option<&ToolCatalog>,
) -> SandboxOutcome {
    engine::run(code, timeout, policy, catalog.cloned()).await
}

#[cfg(feature = "sandbox")]
mod engine {
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use boa_engine::{Context, JsNativeError, JsResult, JsValue, Source};
    use serde_json::Value;
    use tracing::debug;

    use super::{SandboxOutcome, SandboxPolicy};
    use crate::context::{ToolCatalog, ToolInvoker};

    struct HostState {
        stdout: Arc<Mutex<Vec<String>>>,
        stderr: Arc<Mutex<Vec<String>>>,
        invoker: Option<ToolInvoker>,
        handle: Option<tokio::runtime::Handle>,
    }

    thread_local! {
        static HOST: RefCell<Option<HostState>> = const { RefCell::new(None) };
    }

    /// Clears the thread-local on scope exit; blocking threads are pooled
    struct HostGuard;

    impl Drop for HostGuard {
        fn drop(&mut self) {
            HOST.with(|host| host.borrow_mut().take());
        }
    }

    /// `__host_log(stream, text)` - console capture that survives timeouts
    fn host_log(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        let stream = args
            .first()
            .map(|v| v.to_string(context))
            .transpose()?
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_default();
        let text = args
            .get(1)
            .map(|v| v.to_string(context))
            .transpose()?
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_default();
        HOST.with(|host| {
            if let Some(state) = host.borrow().as_ref() {
                let buffer = if stream == "stderr" {
                    &state.stderr
                } else {
                    &state.stdout
                };
                buffer.lock().unwrap().push(text);
            }
        });
        Ok(JsValue::undefined())
    }

    /// `__host_call_tool(name, argsJson)` - re-enter kernel dispatch
    fn host_call_tool(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        let name = args
            .first()
            .map(|v| v.to_string(context))
            .transpose()?
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_default();
        let args_json = args
            .get(1)
            .map(|v| v.to_string(context))
            .transpose()?
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_else(|| "{}".to_string());

        let outcome = HOST.with(|host| {
            let borrowed = host.borrow();
            let Some(state) = borrowed.as_ref() else {
                return Err("host bridge not initialized".to_string());
            };
            let (Some(invoker), Some(handle)) = (&state.invoker, &state.handle) else {
                return Err("tool introspection is not enabled".to_string());
            };
            let parsed: Value =
                serde_json::from_str(&args_json).map_err(|e| format!("bad tool args: {e}"))?;
            handle
                .block_on(invoker(name.clone(), parsed))
                .map_err(|e| e.to_string())
        });

        match outcome {
            Ok(result) => {
                let json = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
                Ok(boa_engine::JsString::from(json).into())
            }
            Err(message) => Err(JsNativeError::error().with_message(message).into()),
        }
    }

    fn preamble(tool_names: &[String]) -> String {
        let mut script = String::from(
            "const __fmt = (v) => typeof v === 'string' ? v : JSON.stringify(v);\n\
             const console = {\n\
               log: (...a) => __host_log('stdout', a.map(__fmt).join(' ')),\n\
               info: (...a) => __host_log('stdout', a.map(__fmt).join(' ')),\n\
               warn: (...a) => __host_log('stderr', a.map(__fmt).join(' ')),\n\
               error: (...a) => __host_log('stderr', a.map(__fmt).join(' ')),\n\
             };\n",
        );
        if !tool_names.is_empty() {
            script.push_str("const tools = {\n");
            for name in tool_names {
                script.push_str(&format!(
                    "  {:?}: (args) => JSON.parse(__host_call_tool({:?}, JSON.stringify(args ?? {{}}))),\n",
                    name, name
                ));
            }
            script.push_str("};\n");
        }
        script
    }

    pub(super) async fn run(
        code: String,
        timeout: Duration,
        policy: &SandboxPolicy,
        catalog: Option<ToolCatalog>,
    ) -> SandboxOutcome {
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let stdout_view = stdout.clone();
        let stderr_view = stderr.clone();
        let stack_limit = (policy.memory_limit / 256).clamp(256 * 1024, 8 * 1024 * 1024) as usize;
        let handle = tokio::runtime::Handle::current();
        let started = Instant::now();

        let expose = policy.expose_tools;
        let task = tokio::task::spawn_blocking(move || {
            HOST.with(|host| {
                *host.borrow_mut() = Some(HostState {
                    stdout,
                    stderr,
                    invoker: catalog.as_ref().filter(|_| expose).map(|c| c.invoker.clone()),
                    handle: Some(handle),
                });
            });
            let _guard = HostGuard;

            // Fresh engine per call; instances are never reused
            let mut context = Context::default();
            context.runtime_limits_mut().set_recursion_limit(512);
            context.runtime_limits_mut().set_stack_size_limit(stack_limit);
            // Backstop for the wall-clock timeout: a runaway loop stops
            // consuming the blocking thread soon after the caller gave up
            context
                .runtime_limits_mut()
                .set_loop_iteration_limit(100_000_000);

            register(&mut context, "__host_log", 2, host_log)?;
            register(&mut context, "__host_call_tool", 2, host_call_tool)?;

            let tool_names = catalog
                .as_ref()
                .filter(|_| expose)
                .map(|c| c.names.clone())
                .unwrap_or_default();

            let script = format!(
                "{}\nglobalThis.__tern_result = (function() {{\n{}\n}})();",
                preamble(&tool_names),
                code
            );
            context
                .eval(Source::from_bytes(script.as_bytes()))
                .map_err(|e| e.to_string())?;

            // Read the result back through the engine's own JSON
            let serialized = context
                .eval(Source::from_bytes(
                    b"JSON.stringify(globalThis.__tern_result)",
                ))
                .map_err(|e| e.to_string())?;
            if serialized.is_undefined() || serialized.is_null() {
                return Ok(None);
            }
            let json = serialized
                .to_string(&mut context)
                .map_err(|e| e.to_string())?
                .to_std_string_escaped();
            let value: Option<Value> = serde_json::from_str(&json).ok();
            Ok::<Option<Value>, String>(value)
        });

        let drain = |buffer: &Arc<Mutex<Vec<String>>>| -> String {
            let lines = buffer.lock().unwrap();
            if lines.is_empty() {
                String::new()
            } else {
                format!("{}\n", lines.join("\n"))
            }
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(return_value))) => SandboxOutcome {
                success: true,
                return_value,
                stdout: drain(&stdout_view),
                stderr: drain(&stderr_view),
                error: None,
                stack_trace: None,
                execution_time: started.elapsed().as_millis() as u64,
            },
            Ok(Ok(Err(js_error))) => {
                debug!(error = %js_error, "sandboxed code failed");
                SandboxOutcome {
                    success: false,
                    return_value: None,
                    stdout: drain(&stdout_view),
                    stderr: drain(&stderr_view),
                    error: Some(js_error.clone()),
                    stack_trace: Some(js_error),
                    execution_time: started.elapsed().as_millis() as u64,
                }
            }
            Ok(Err(join_error)) => SandboxOutcome::failure(
                format!("sandbox execution panicked: {join_error}"),
                drain(&stdout_view),
                drain(&stderr_view),
                started.elapsed().as_millis() as u64,
            ),
            Err(_) => SandboxOutcome::failure(
                format!("Execution timed out after {}ms", timeout.as_millis()),
                drain(&stdout_view),
                drain(&stderr_view),
                started.elapsed().as_millis() as u64,
            ),
        }
    }

    fn register(
        context: &mut Context,
        name: &str,
        arity: usize,
        body: fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>,
    ) -> Result<(), String> {
        context
            .register_global_callable(
                boa_engine::JsString::from(name),
                arity,
                boa_engine::NativeFunction::from_fn_ptr(body),
            )
            .map_err(|e| e.to_string())
    }
}

/// Strip TypeScript type annotations so the source runs on a JS engine.
///
/// A lexical pass covering the common surface: variable and parameter
/// annotations, return types, `as` casts, and `interface`/`type`
/// declarations. Generic-heavy code should ship as JavaScript.
pub fn strip_type_annotations(code: &str) -> String {
    let mut out = code.to_string();

    // interface X { ... } blocks (brace matched)
    out = strip_interface_blocks(&out);

    // type X = ...; aliases
    let type_alias = regex::Regex::new(r"(?m)^\s*(?:export\s+)?type\s+\w+\s*=[^;]*;\s*$")
        .expect("type alias regex");
    out = type_alias.replace_all(&out, "").into_owned();

    // const/let/var x: T =
    let var_annotation =
        regex::Regex::new(r"\b(const|let|var)\s+([A-Za-z_$][\w$]*)\s*:\s*[^=;,(]+=")
            .expect("var annotation regex");
    out = var_annotation.replace_all(&out, "$1 $2 =").into_owned();

    // parameter annotations: (a: T, b: U)
    let param_annotation = regex::Regex::new(
        r"([(,]\s*[A-Za-z_$][\w$]*)\s*:\s*[A-Za-z_$][\w$.]*(?:<[^>()]*>)?(?:\[\])*",
    )
    .expect("param annotation regex");
    out = param_annotation.replace_all(&out, "$1").into_owned();

    // return type: ): T { or ): T =>
    let return_annotation =
        regex::Regex::new(r"\)\s*:\s*[A-Za-z_$][\w$.]*(?:<[^>()]*>)?(?:\[\])*\s*(\{|=>)")
            .expect("return annotation regex");
    out = return_annotation.replace_all(&out, ") $1").into_owned();

    // as-casts
    let as_cast = regex::Regex::new(r"\s+as\s+[A-Za-z_$][\w$.]*(?:<[^>()]*>)?(?:\[\])*")
        .expect("as cast regex");
    out = as_cast.replace_all(&out, "").into_owned();

    out
}

fn strip_interface_blocks(code: &str) -> String {
    let marker = regex::Regex::new(r"(?m)^\s*(?:export\s+)?interface\s+\w+[^{]*\{")
        .expect("interface regex");
    let mut out = String::new();
    let mut rest = code;
    while let Some(found) = marker.find(rest) {
        out.push_str(&rest[..found.start()]);
        let after = &rest[found.end()..];
        let mut depth = 1usize;
        let mut end = after.len();
        for (i, ch) in after.char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        rest = &after[end.min(after.len())..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_variable_annotation() {
        let stripped = strip_type_annotations("const x: number = 40 + 2;");
        assert_eq!(stripped, "const x = 40 + 2;");
        let stripped = strip_type_annotations("const x:number=40+2;");
        assert_eq!(stripped, "const x =40+2;");
    }

    #[test]
    fn test_strip_param_and_return_annotations() {
        let stripped =
            strip_type_annotations("function add(a: number, b: number): number { return a + b; }");
        assert_eq!(stripped, "function add(a, b) { return a + b; }");
    }

    #[test]
    fn test_strip_interface_and_alias() {
        let code = "interface Point { x: number; y: number; }\ntype Id = string;\nconst p = 1;";
        let stripped = strip_type_annotations(code);
        assert!(!stripped.contains("interface"));
        assert!(!stripped.contains("type Id"));
        assert!(stripped.contains("const p = 1;"));
    }

    #[test]
    fn test_object_literals_untouched() {
        let code = "const o = { a: 1, b: 'two' };";
        assert_eq!(strip_type_annotations(code), code);
    }

    #[test]
    fn test_ternary_untouched() {
        let code = "const v = flag ? left : right;";
        assert_eq!(strip_type_annotations(code), code);
    }

    #[tokio::test]
    async fn test_container_mode_reports_missing_backend() {
        let outcome = execute(
            SandboxRequest {
                language: Language::Javascript,
                code: "return 1;".to_string(),
                timeout_ms: None,
            },
            &SandboxPolicy {
                mode: SandboxMode::Container,
                ..Default::default()
            },
            None,
        )
        .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("container"));
    }

    #[cfg(feature = "sandbox")]
    mod engine_tests {
        use super::super::*;

        #[tokio::test]
        async fn test_typescript_roundtrip() {
            let outcome = execute(
                SandboxRequest {
                    language: Language::Typescript,
                    code: "const x: number = 40 + 2;\nconsole.log('hi');\nreturn x;".to_string(),
                    timeout_ms: None,
                },
                &SandboxPolicy::default(),
                None,
            )
            .await;
            assert!(outcome.success, "outcome: {:?}", outcome.error);
            assert_eq!(outcome.return_value, Some(serde_json::json!(42)));
            assert_eq!(outcome.stdout, "hi\n");
            assert!(outcome.execution_time < 5000);
        }

        #[tokio::test]
        async fn test_infinite_loop_times_out() {
            let outcome = execute(
                SandboxRequest {
                    language: Language::Javascript,
                    code: "while(true){}".to_string(),
                    timeout_ms: Some(200),
                },
                &SandboxPolicy::default(),
                None,
            )
            .await;
            assert!(!outcome.success);
            assert_eq!(
                outcome.error.as_deref(),
                Some("Execution timed out after 200ms")
            );
        }

        #[tokio::test]
        async fn test_partial_stdout_preserved_on_timeout() {
            let outcome = execute(
                SandboxRequest {
                    language: Language::Javascript,
                    code: "console.log('before'); while(true){}".to_string(),
                    timeout_ms: Some(200),
                },
                &SandboxPolicy::default(),
                None,
            )
            .await;
            assert!(!outcome.success);
            assert_eq!(outcome.stdout, "before\n");
        }

        #[tokio::test]
        async fn test_js_error_reported() {
            let outcome = execute(
                SandboxRequest {
                    language: Language::Javascript,
                    code: "throw new Error('deliberate');".to_string(),
                    timeout_ms: None,
                },
                &SandboxPolicy::default(),
                None,
            )
            .await;
            assert!(!outcome.success);
            assert!(outcome.error.unwrap().contains("deliberate"));
        }

        #[tokio::test]
        async fn test_no_host_stdlib_access() {
            let outcome = execute(
                SandboxRequest {
                    language: Language::Javascript,
                    code: "return typeof require;".to_string(),
                    timeout_ms: None,
                },
                &SandboxPolicy::default(),
                None,
            )
            .await;
            assert!(outcome.success);
            assert_eq!(outcome.return_value, Some(serde_json::json!("undefined")));
        }
    }
}
