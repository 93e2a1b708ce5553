use crate::traits::ScriptRuntime;
use crate::EngineError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hosts the ranking module inside the interpreter. The module only has to
/// define `set_model_file_data(name, data)` and `search(text)`; anything it
/// prints goes to stderr so stdout carries nothing but replies.
const DRIVER: &str = r#"
import base64
import json
import sys
import traceback

_replies = sys.stdout
sys.stdout = sys.stderr
_namespace = {"__name__": "ranking_module"}
_ENTRY_POINTS = ("set_model_file_data", "search")


def _reply(message):
    _replies.write(json.dumps(message) + "\n")
    _replies.flush()


while True:
    _line = sys.stdin.readline()
    if not _line:
        break
    try:
        _request = json.loads(_line)
    except ValueError:
        continue
    _id = _request.get("id")
    try:
        _call = _request["call"]
        if _call == "load_module":
            exec(compile(_request["source"], "<ranking module>", "exec"), _namespace)
            for _name in _ENTRY_POINTS:
                if not callable(_namespace.get(_name)):
                    raise NameError("ranking module does not define " + _name)
            _reply({"id": _id, "ready": True})
        elif _call == "set_model_file_data":
            _namespace["set_model_file_data"](_request["name"], base64.b64decode(_request["data"]))
            _reply({"id": _id, "ok": None})
        elif _call == "search":
            _reply({"id": _id, "ok": _namespace["search"](_request["query"])})
        else:
            raise ValueError("unknown call " + repr(_call))
    except Exception:
        _reply({"id": _id, "error": traceback.format_exc(limit=4)})
"#;

#[derive(Debug, Clone)]
pub struct ProcessRuntimeConfig {
    pub interpreter: String,
    pub install_packages: bool,
    /// Arguments placed before the package names when installing.
    pub installer_args: Vec<String>,
}

impl Default for ProcessRuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            install_packages: true,
            installer_args: ["-m", "pip", "install", "--quiet"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
enum RuntimeRequest<'a> {
    LoadModule { source: &'a str },
    SetModelFileData { name: &'a str, data: String },
    Search { query: &'a str },
}

#[derive(Debug, Serialize)]
struct TaggedRequest<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a RuntimeRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct RuntimeReply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    ok: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RuntimeReply {
    fn into_value(self) -> Result<Value, EngineError> {
        match (self.ok, self.error) {
            (_, Some(error)) => Err(EngineError::Call(error)),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }
}

struct Session {
    // Held so the child is killed when the session drops.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Session {
    /// Sends one request and reads until the reply carrying the same id.
    /// Lines that are not replies, or replies to other ids, are skipped.
    async fn exchange(
        &mut self,
        id: u64,
        request: &RuntimeRequest<'_>,
    ) -> Result<RuntimeReply, EngineError> {
        let line = encode_request(id, request)?;
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| EngineError::Call("engine process closed its output".to_string()))?;

            match decode_reply(&line) {
                Ok(reply) if reply.id == Some(id) => return Ok(reply),
                Ok(reply) => debug!(expected = id, got = ?reply.id, "skipping reply for another request"),
                Err(error) => debug!(%error, "skipping non-reply engine output"),
            }
        }
    }
}

/// Runs the ranking module in an interpreter child process and talks to it
/// with one JSON object per line on stdin/stdout.
///
/// Every request carries an `id`; the driver answers with the same `id`
/// and either `ready`, `ok` or `error`.
pub struct ProcessRuntime {
    config: ProcessRuntimeConfig,
    started: AtomicBool,
    next_id: AtomicU64,
    session: Mutex<Option<Session>>,
}

impl ProcessRuntime {
    pub fn new(config: ProcessRuntimeConfig) -> Self {
        Self {
            config,
            started: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    /// A transport failure ends the session, so later calls fail with
    /// `NotReady` instead of reading replies meant for someone else.
    async fn call(&self, request: &RuntimeRequest<'_>) -> Result<Value, EngineError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(EngineError::NotReady)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        match session.exchange(id, request).await {
            Ok(reply) => reply.into_value(),
            Err(error) => {
                warn!(%error, "engine session lost");
                *guard = None;
                Err(error)
            }
        }
    }
}

fn encode_request(id: u64, request: &RuntimeRequest<'_>) -> Result<String, EngineError> {
    let mut line = serde_json::to_string(&TaggedRequest { id, request })?;
    line.push('\n');
    Ok(line)
}

fn decode_reply(line: &str) -> Result<RuntimeReply, serde_json::Error> {
    serde_json::from_str(line)
}

fn describe_failure(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{} ({})", stderr.trim(), output.status)
}

#[async_trait]
impl ScriptRuntime for ProcessRuntime {
    async fn start(&self) -> Result<(), EngineError> {
        let output = Command::new(&self.config.interpreter)
            .arg("--version")
            .output()
            .await
            .map_err(|error| {
                EngineError::RuntimeStart(format!("{}: {error}", self.config.interpreter))
            })?;

        if !output.status.success() {
            return Err(EngineError::RuntimeStart(describe_failure(&output)));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(interpreter = %self.config.interpreter, version = %version.trim(), "engine runtime started");
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn install_packages(&self, packages: &[String]) -> Result<(), EngineError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(EngineError::PackageInstall("runtime not started".to_string()));
        }
        if !self.config.install_packages || packages.is_empty() {
            debug!("package installation skipped");
            return Ok(());
        }

        let output = Command::new(&self.config.interpreter)
            .args(&self.config.installer_args)
            .args(packages)
            .output()
            .await
            .map_err(|error| EngineError::PackageInstall(error.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::PackageInstall(describe_failure(&output)));
        }
        Ok(())
    }

    async fn load_module(&self, source: &str) -> Result<(), EngineError> {
        if !self.started.load(Ordering::Acquire) {
            return Err(EngineError::ModuleLoad("runtime not started".to_string()));
        }

        let mut child = Command::new(&self.config.interpreter)
            .arg("-u")
            .arg("-c")
            .arg(DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| EngineError::ModuleLoad(error.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::ModuleLoad("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::ModuleLoad("engine stdout unavailable".to_string()))?;
        let mut session = Session {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let reply = session
            .exchange(id, &RuntimeRequest::LoadModule { source })
            .await
            .map_err(|error| EngineError::ModuleLoad(error.to_string()))?;
        if let Some(error) = reply.error {
            return Err(EngineError::ModuleLoad(error));
        }
        if !reply.ready {
            return Err(EngineError::ModuleLoad("module reported not ready".to_string()));
        }

        *self.session.lock().await = Some(session);
        Ok(())
    }

    async fn set_model_file_data(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let request = RuntimeRequest::SetModelFileData {
            name,
            data: STANDARD.encode(data),
        };
        self.call(&request)
            .await
            .map(|_| ())
            .map_err(|error| EngineError::Ingest {
                name: name.to_string(),
                details: error.to_string(),
            })
    }

    async fn search(&self, query: &str) -> Result<String, EngineError> {
        match self.call(&RuntimeRequest::Search { query }).await? {
            Value::String(results) => Ok(results),
            other => Err(EngineError::Call(format!(
                "search returned {other} instead of a JSON string"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArtifactRegistry, ModelArtifacts, ReadinessState, SearchEngineBridge};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Shaped like the real ranking module: two plain functions, chatty on stdout.
    const ENTRY_POINT_MODULE: &str = r#"
import json

print("loading ranking module")
_files = {}


def set_model_file_data(name, value):
    print("reading {}".format(name))
    _files[name] = value


def search(text):
    print("searching", text)
    return json.dumps([{
        "page_id": 1,
        "page_title": text.replace(" ", "_"),
        "item_id": 10,
        "score": 0.97,
        "views": len(_files["a.bin"]),
        "in_link_count": 50,
        "out_link_count": 20,
        "isa_featured_article": True,
        "isa_good_article": False,
    }])
"#;

    fn runtime() -> ProcessRuntime {
        ProcessRuntime::new(ProcessRuntimeConfig {
            install_packages: false,
            ..Default::default()
        })
    }

    async fn loaded(source: &str) -> Result<ProcessRuntime, EngineError> {
        let runtime = runtime();
        runtime.start().await?;
        runtime.load_module(source).await?;
        Ok(runtime)
    }

    #[test]
    fn requests_are_single_tagged_json_lines() -> Result<(), Box<dyn std::error::Error>> {
        let line = encode_request(
            7,
            &RuntimeRequest::SetModelFileData {
                name: "cv.joblib",
                data: STANDARD.encode([0u8, 159, 146, 150]),
            },
        )?;
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let value: Value = serde_json::from_str(line.trim_end())?;
        assert_eq!(value["id"], 7);
        assert_eq!(value["call"], "set_model_file_data");
        assert_eq!(value["name"], "cv.joblib");
        assert_eq!(value["data"], "AJ+Slg==");

        let search = encode_request(8, &RuntimeRequest::Search { query: "multi\nline" })?;
        assert_eq!(search.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(search.trim_end())?;
        assert_eq!(value["query"], "multi\nline");
        Ok(())
    }

    #[test]
    fn replies_map_to_values_or_call_errors() -> Result<(), Box<dyn std::error::Error>> {
        let reply = decode_reply(r#"{"id":3,"ok":"[]"}"#)?;
        assert_eq!(reply.id, Some(3));
        assert_eq!(reply.into_value()?, Value::String("[]".to_string()));
        assert_eq!(decode_reply(r#"{"id":4,"ok":null}"#)?.into_value()?, Value::Null);
        assert!(decode_reply(r#"{"id":1,"ready":true}"#)?.ready);
        assert!(matches!(
            decode_reply(r#"{"id":5,"error":"KeyError: 'tokenizer'"}"#)?.into_value(),
            Err(EngineError::Call(message)) if message.contains("KeyError")
        ));
        assert!(decode_reply("reading cv.joblib").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn missing_interpreter_fails_start() {
        let runtime = ProcessRuntime::new(ProcessRuntimeConfig {
            interpreter: "/nonexistent/wikiwhatsthis-interpreter".to_string(),
            ..Default::default()
        });

        let result = runtime.start().await;
        assert!(matches!(result, Err(EngineError::RuntimeStart(_))));
    }

    #[tokio::test]
    async fn steps_out_of_order_are_rejected() {
        let runtime = ProcessRuntime::new(ProcessRuntimeConfig::default());

        assert!(matches!(
            runtime.install_packages(&["numpy".to_string()]).await,
            Err(EngineError::PackageInstall(_))
        ));
        assert!(matches!(
            runtime.load_module("print('x')").await,
            Err(EngineError::ModuleLoad(_))
        ));
        assert!(matches!(runtime.search("q").await, Err(EngineError::NotReady)));
        assert!(matches!(
            runtime.set_model_file_data("cv.joblib", b"x").await,
            Err(EngineError::Ingest { .. })
        ));
    }

    #[tokio::test]
    async fn bridge_boots_entry_point_module_and_searches() {
        let readiness = Arc::new(ReadinessState::new());
        let bridge = SearchEngineBridge::new(
            runtime(),
            Arc::clone(&readiness),
            vec!["numpy".to_string()],
            ENTRY_POINT_MODULE,
        );
        let registry = ArtifactRegistry::new(["a.bin"]);
        let files = BTreeMap::from([("a.bin".to_string(), vec![0u8, 1, 2, 255])]);
        let artifacts = ModelArtifacts::from_complete(&registry, files).expect("complete");

        bridge.boot(artifacts).await.expect("boot should succeed");
        assert!(readiness.models_ready());

        let results = bridge.search("Ada Lovelace").await.expect("search should succeed");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_title, "Ada_Lovelace");
        assert_eq!(results[0].score, 0.97);
        // Byte length seen by the module proves the payload was decoded.
        assert_eq!(results[0].views, 4);
        assert!(results[0].isa_featured_article);
    }

    #[tokio::test]
    async fn module_output_never_reaches_the_reply_channel() {
        let runtime = loaded(ENTRY_POINT_MODULE).await.expect("module should load");
        runtime
            .set_model_file_data("a.bin", b"abc")
            .await
            .expect("ingest should succeed despite prints");

        for query in ["first query", "second query"] {
            let raw = runtime.search(query).await.expect("search should succeed");
            let value: Value = serde_json::from_str(&raw).expect("engine returns JSON");
            assert_eq!(value[0]["page_title"], query.replace(' ', "_"));
            assert_eq!(value[0]["views"], 3);
        }
    }

    #[tokio::test]
    async fn module_without_entry_points_fails_to_load() {
        let result = loaded("def search(text):\n    return '[]'\n").await;
        assert!(matches!(result, Err(EngineError::ModuleLoad(message)) if message.contains("set_model_file_data")));

        let result = loaded("raise RuntimeError('broken module')\n").await;
        assert!(matches!(result, Err(EngineError::ModuleLoad(message)) if message.contains("broken module")));
    }

    #[tokio::test]
    async fn engine_exceptions_fail_one_call_only() {
        let module = r#"
def set_model_file_data(name, value):
    pass


def search(text):
    if text == "explode":
        raise KeyError("tokenizer")
    return "[]"
"#;
        let runtime = loaded(module).await.expect("module should load");

        let failed = runtime.search("explode").await;
        assert!(matches!(failed, Err(EngineError::Call(message)) if message.contains("KeyError")));
        assert_eq!(runtime.search("fine").await.expect("session survives"), "[]");
    }

    #[tokio::test]
    async fn stray_lines_on_raw_stdout_do_not_shift_replies() {
        let module = r#"
import os


def set_model_file_data(name, value):
    pass


def search(text):
    os.write(1, b'not json\n{"id": 999999, "ok": "stale"}\n')
    return text
"#;
        let runtime = loaded(module).await.expect("module should load");

        assert_eq!(runtime.search("one").await.expect("search"), "one");
        assert_eq!(runtime.search("two").await.expect("search"), "two");
    }

    #[tokio::test]
    async fn lost_engine_process_ends_the_session() {
        let module = r#"
import os


def set_model_file_data(name, value):
    pass


def search(text):
    os._exit(3)
"#;
        let runtime = loaded(module).await.expect("module should load");

        assert!(matches!(runtime.search("q").await, Err(EngineError::Call(_))));
        assert!(matches!(runtime.search("q").await, Err(EngineError::NotReady)));
    }
}
