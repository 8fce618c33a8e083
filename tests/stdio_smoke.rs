use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

#[test]
fn stdio_smoke() {
    // `cargo test` sets this for integration tests.
    let bin = env!("CARGO_BIN_EXE_ctxsteer");

    let repo = tempfile::TempDir::new().expect("tempdir");
    std::fs::create_dir_all(repo.path().join("src/gen")).unwrap();
    std::fs::write(repo.path().join("src/a.ts"), "a".repeat(40)).unwrap();
    std::fs::write(repo.path().join("src/gen/b.ts"), "b".repeat(20)).unwrap();
    std::fs::write(repo.path().join("README.md"), "c".repeat(12)).unwrap();
    let repo_root = repo.path().to_string_lossy().to_string();

    let mut child = Command::new(bin)
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn ctxsteer serve");

    {
        let stdin = child.stdin.as_mut().expect("child stdin");

        // Keep each JSON-RPC message on one line (server reads by lines()).
        let requests = [
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": { "protocolVersion": "2024-11-05" }
            }),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "rules/add",
                "params": { "repoPath": repo_root, "kind": "include", "pattern": "src/**/*.ts" }
            }),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "rules/add",
                "params": { "repoPath": repo_root, "kind": "exclude", "pattern": "src/gen/**/*" }
            }),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "rules/list",
                "params": { "repoPath": repo_root }
            }),
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "context/snapshot",
                "params": { "repoPath": repo_root, "xml": true }
            }),
        ];
        for req in requests {
            writeln!(stdin, "{}", req).unwrap();
        }
    }

    // Close stdin so the server loop can exit.
    drop(child.stdin.take());

    let stdout = child.stdout.take().expect("child stdout");
    let reader = BufReader::new(stdout);

    let mut replies_by_id: HashMap<i64, serde_json::Value> = HashMap::new();
    for line in reader.lines() {
        let line = line.expect("read stdout line");
        if line.trim().is_empty() {
            continue;
        }
        let v: serde_json::Value = serde_json::from_str(&line).expect("stdout is json");
        let id = v
            .get("id")
            .and_then(|x| x.as_i64())
            .expect("json-rpc response id");
        replies_by_id.insert(id, v);
    }

    let status = child.wait().expect("wait child");
    assert!(status.success(), "serve should exit cleanly on EOF");
    assert_eq!(replies_by_id.len(), 5);

    // initialize
    {
        let v = &replies_by_id[&1];
        assert_eq!(v.get("jsonrpc").and_then(|x| x.as_str()), Some("2.0"));
        let result = v.get("result").expect("initialize result");
        assert!(result.get("capabilities").is_some());
        assert_eq!(result["serverInfo"]["name"], "ctxsteer");
    }

    // rules/list: include matches both .ts files even though one is excluded
    {
        let result = &replies_by_id[&4]["result"];
        assert_eq!(result["ruleCount"], 2);
        let rows = result["rows"].as_array().expect("rows");
        let include = rows
            .iter()
            .find(|r| r["kind"] == "include")
            .expect("include row");
        assert_eq!(include["matchedFileCount"], 2);
        assert_eq!(include["matchedTokenCount"], 15);
        let exclude = rows
            .iter()
            .find(|r| r["kind"] == "exclude")
            .expect("exclude row");
        assert_eq!(exclude["matchedTokenCount"], 5);
        // Default view: tokens, descending.
        assert_eq!(rows[0]["kind"], "include");
    }

    // context/snapshot
    {
        let result = &replies_by_id[&5]["result"];
        assert_eq!(result["fileCount"], 1);
        assert_eq!(result["totalTokens"], 10);
        let xml = result["xml"].as_str().expect("xml payload");
        assert!(xml.contains(r#"<file path="src/a.ts" tokens="10">"#));
        assert!(!xml.contains("src/gen/b.ts"));
    }

    // Rules were persisted next to the payload.
    let rules_json = std::fs::read_to_string(repo.path().join(".ctxsteer/rules.json")).expect("rules.json");
    let rules: serde_json::Value = serde_json::from_str(&rules_json).unwrap();
    assert_eq!(rules["include"], serde_json::json!(["src/**/*.ts"]));
    assert_eq!(rules["exclude"], serde_json::json!(["src/gen/**/*"]));
    assert!(repo.path().join(".ctxsteer/active_context.xml").exists());
}
