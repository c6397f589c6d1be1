//! End-to-end routing behaviour over real sockets.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use moxy::{
    json_response, text_response, AddRouteOptions, Handler, MockRequest, MoxyError, PathConfig,
    ResponseSpec, RouteConfig, Variables,
};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_placeholder_round_trip() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on("/e/:v", PathConfig::new().get(ResponseSpec::new(200).body(json!({ "value": ":v" }))))
            .unwrap();
    })
    .await;

    let res = common::client().get(server.url("/e/hello")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "value": "hello" }));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_login_and_unknown_verb() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/auth/login",
            PathConfig::new().post(ResponseSpec::new(200).body(json!({ "active": true, "user_id": "user_id" }))),
        )
        .unwrap();
    })
    .await;
    let client = common::client();

    let res = client.post(server.url("/auth/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "active": true, "user_id": "user_id" })
    );

    let res = client.get(server.url("/auth/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "message": "Not found", "status": 404 })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_temporary_overrides() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on("/hello/world", PathConfig::new().get(ResponseSpec::new(200).body("hi!")))
            .unwrap();
    })
    .await;
    let client = common::client();
    let get = || client.get(server.url("/hello/world")).send();
    let post = || client.post(server.url("/hello/world")).send();

    assert_eq!(get().await.unwrap().text().await.unwrap(), "hi!");
    assert_eq!(post().await.unwrap().status(), StatusCode::NOT_FOUND);

    server
        .routes()
        .add_route(
            "/hello/world",
            PathConfig::new().post(ResponseSpec::new(201).body(json!({ "message": "welcome" }))),
            AddRouteOptions::once(),
        )
        .unwrap();

    assert_eq!(get().await.unwrap().status(), StatusCode::OK);
    let res = post().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "message": "welcome" }));
    assert_eq!(post().await.unwrap().status(), StatusCode::NOT_FOUND);

    for status in [400, 401, 402] {
        server
            .routes()
            .add_route(
                "/hello/world",
                PathConfig::new().get(ResponseSpec::new(status)),
                AddRouteOptions::once(),
            )
            .unwrap();
    }
    for status in [400, 401, 402, 200] {
        assert_eq!(get().await.unwrap().status().as_u16(), status);
    }

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_delays() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/test",
            PathConfig::new()
                .get(ResponseSpec::new(200))
                .post(ResponseSpec::new(201).delay(100)),
        )
        .unwrap();
    })
    .await;
    let client = common::client();

    let started = Instant::now();
    assert_eq!(client.get(server.url("/test")).send().await.unwrap().status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(100));

    let started = Instant::now();
    assert_eq!(
        client.post(server.url("/test")).send().await.unwrap().status(),
        StatusCode::CREATED
    );
    assert!(started.elapsed() >= Duration::from_millis(100));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handlers_and_precedence() {
    let brew = Handler::named("brew", |_req: MockRequest, vars: Variables| async move {
        let user = vars.get("userId").and_then(|v| v.first()).unwrap_or_default().to_string();
        Ok(text_response(format!("Brew started for {user}"), StatusCode::CREATED))
    });

    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/manual-override",
            RouteConfig::handler(|_req, _vars| async {
                Ok(text_response("I am a teapot", StatusCode::IM_A_TEAPOT))
            }),
        )
        .unwrap();
        s.on(
            "/partly-manual-override/:userId",
            PathConfig::new()
                .get(ResponseSpec::new(418).body("I am a teapot"))
                .post(brew),
        )
        .unwrap();
        s.on("/first/:x", PathConfig::new().get(ResponseSpec::new(200).body("first")))
            .unwrap();
        s.on("/first/(?<rest>.*)", PathConfig::new().get(ResponseSpec::new(200).body("second")))
            .unwrap();
    })
    .await;
    let client = common::client();

    for method in [reqwest::Method::GET, reqwest::Method::DELETE] {
        let res = client
            .request(method, server.url("/manual-override"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    }

    let res = client
        .post(server.url("/partly-manual-override/user_id"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.text().await.unwrap(), "Brew started for user_id");

    let res = client.get(server.url("/first/one")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "first");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_reads_request() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/echo",
            PathConfig::new().post(Handler::new(|mut req: MockRequest, vars: Variables| async move {
                let body: Value = req.json().await?;
                Ok::<_, MoxyError>(json_response(
                    &json!({
                        "path": req.path(),
                        "query": vars,
                        "body": body,
                        "header": req.headers().get("x-echo").and_then(|v| v.to_str().ok()),
                    }),
                    StatusCode::OK,
                ))
            })),
        )
        .unwrap();
    })
    .await;

    let res = common::client()
        .post(server.url("/echo?a=1&a=2&b"))
        .header("x-echo", "yes")
        .json(&json!({ "hello": "moxy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({
            "path": "/echo",
            "query": { "a": ["1", "2"], "b": "" },
            "body": { "hello": "moxy" },
            "header": "yes",
        })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_query_and_path_params() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/test-params/:tpId\\?search=:search",
            PathConfig::new().get(ResponseSpec::new(401).body(json!([["tpId", ":tpId"], ["search", ":search"]]))),
        )
        .unwrap();
        s.on(
            "/test-params/:tpId",
            PathConfig::new().get(ResponseSpec::new(200).body(json!({ "id": ":tpId", "search": ":search" }))),
        )
        .unwrap();
        s.on(
            "/path/with/query\\?search=:theSearchThing",
            PathConfig::new().get(
                ResponseSpec::default()
                    .body("you searched for :theSearchThing")
                    .header("Content-Type", "text/plain"),
            ),
        )
        .unwrap();
    })
    .await;
    let client = common::client();

    let res = client
        .get(server.url("/test-params/42?search=moxy"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!([["tpId", "42"], ["search", "moxy"]])
    );

    let res = client.get(server.url("/test-params/42")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "id": "42", "search": ":search" })
    );

    let res = client
        .get(server.url("/path/with/query?search=:theSearchThing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_exact_routes() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on(
            "/exact/match/:notCaptured?queryMustHave",
            PathConfig::new().exact().get(ResponseSpec::new(204)),
        )
        .unwrap();
        s.on_with(
            "/exact/match/handler?ignore=(.*)",
            PathConfig::new().all(Handler::new(|_req: MockRequest, _vars: Variables| async {
                Ok(json_response(&json!({ "matchedExactly": true }), StatusCode::OK))
            })),
            AddRouteOptions::exact(),
        )
        .unwrap();
    })
    .await;
    let client = common::client();

    let res = client
        .get(server.url("/exact/match/:notCaptured?queryMustHave"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(server.url("/exact/match/anything?queryMustHave"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .put(server.url("/exact/match/handler?ignore=(.*)"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "matchedExactly": true }));

    let res = client
        .get(server.url("/exact/match/handler?ignore=everything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_static_files() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on("/static/(?<file>.*)", PathConfig::new().get("/fixtures/static/:file"))
            .unwrap();
    })
    .await;
    let client = common::client();

    let res = client
        .get(server.url("/static/index.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert!(res.text().await.unwrap().contains("static fixture"));

    let res = client
        .get(server.url("/static/../../Cargo.toml"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(server.url("/static/missing.png")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "status": 404, "body": "Not found" })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_path_level_file_route() {
    let server = common::start_mock_server(common::test_config(), |s| {
        s.on("/assets/(?<file>.*)", PathConfig::new().get(ResponseSpec::new(418)))
            .unwrap();
        s.on("/assets/(?<file>.*)", "/fixtures/static/:file").unwrap();
    })
    .await;
    let client = common::client();

    let res = client.get(server.url("/assets/data.json")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "fixture": true }));

    let res = client.post(server.url("/assets/index.html")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.text().await.unwrap().contains("static fixture"));

    let res = client.get(server.url("/_moxy/router")).send().await.unwrap();
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!({ "/assets/(?<file>.*)": "/fixtures/static/:file" })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_routes_from_folder() {
    let server = common::start_mock_server(common::test_config(), |s| {
        let loaded = s
            .add_routes_from_folder(common::fixtures_dir().join("load-from-dir"))
            .unwrap();
        assert_eq!(loaded, 4);
    })
    .await;
    let client = common::client();

    let res = client.get(server.url("/_moxy/routes")).send().await.unwrap();
    assert_eq!(
        res.json::<Value>().await.unwrap(),
        json!([
            "/a/test",
            "/a/users/:username",
            "/b/json-b-test",
            "/b/json-b-test/users/something",
            "/a/y/test",
            "/b/x/test",
            "/b/x/wait/:id",
        ])
    );

    let res = client.get(server.url("/a/users/pat")).send().await.unwrap();
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "username": "pat" }));

    let res = client
        .delete(server.url("/b/json-b-test/users/something"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()["content-type"], "text/html");

    let res = client.get(server.url("/b/x/wait/7")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(res.text().await.unwrap(), "queued 7");

    server.close().await.unwrap();
}
