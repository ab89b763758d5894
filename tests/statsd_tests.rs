//! Statsd wire format, checked against a real UDP socket.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::UdpSocket;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;

use request_telemetry::sinks::StatsdSink;
use request_telemetry::statsd::StatsdClient;
use request_telemetry::{LogSink, RequestLog};

fn agent() -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    socket
}

fn sink_for(agent: &UdpSocket) -> StatsdSink<StatsdClient> {
    let client = StatsdClient::new(agent.local_addr().unwrap())
        .unwrap()
        .with_namespace("service.logging.live.")
        .with_tags(["test"]);
    StatsdSink::new(client)
}

fn recv_lines(agent: &UdpSocket, count: usize) -> Vec<String> {
    let mut buf = [0u8; 1024];
    (0..count)
        .map(|_| {
            let n = agent.recv(&mut buf).unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        })
        .collect()
}

fn event(method: Method, target: &str, status: StatusCode, duration: Duration) -> RequestLog {
    let req = Request::builder()
        .method(method)
        .uri(target)
        .body(Body::empty())
        .unwrap();
    let mut event = RequestLog::from_request(&req, Utc::now());
    event.status = status;
    event.duration = duration;
    event
}

#[test]
fn test_get_root_lines() {
    let agent = agent();
    let sink = sink_for(&agent);

    sink.log(&event(
        Method::GET,
        "/",
        StatusCode::OK,
        Duration::from_millis(302),
    ));

    assert_eq!(
        recv_lines(&agent, 2),
        vec![
            "service.logging.live.request.response_time:302.000000|ms|#test,endpoint:/,statusCode:200,method:GET",
            "service.logging.live.request.count:1|c|#test,endpoint:/,statusCode:200,method:GET",
        ]
    );
}

#[test]
fn test_post_path_drops_query_from_endpoint() {
    let agent = agent();
    let sink = sink_for(&agent);

    sink.log(&event(
        Method::POST,
        "/path/here?user=42",
        StatusCode::CREATED,
        Duration::from_micros(102_250),
    ));

    assert_eq!(
        recv_lines(&agent, 2),
        vec![
            "service.logging.live.request.response_time:102.250000|ms|#test,endpoint:/path/here,statusCode:201,method:POST",
            "service.logging.live.request.count:1|c|#test,endpoint:/path/here,statusCode:201,method:POST",
        ]
    );
}

#[test]
fn test_unreachable_agent_does_not_fail_request() {
    // Nothing listens here once the socket is dropped
    let addr = agent().local_addr().unwrap();
    let client = StatsdClient::new(addr).unwrap();
    let sink = StatsdSink::new(client);

    for _ in 0..3 {
        sink.log(&event(
            Method::GET,
            "/",
            StatusCode::OK,
            Duration::from_millis(1),
        ));
    }
}
