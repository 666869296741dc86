use std::fmt::Write as _;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{info, warn};

use crate::alarm::model::{Alarm, AlarmRecord, WEEKDAYS, format_weekdays, weekday_to_token};
use crate::alarm::store::{self, SharedStore};
use crate::config::HttpConfig;
use crate::state::{SharedUiState, UiSnapshot};

pub struct HttpServer {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn start(config: &HttpConfig, store: SharedStore, ui: SharedUiState) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow::anyhow!("failed to start HTTP server on {bind}: {err}"))?;
        info!(%bind, "http server listening");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let join = thread::spawn(move || run_server_loop(server, store, ui, stop_for_thread));
        Ok(Self {
            stop,
            join: Some(join),
        })
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(server: Server, store: SharedStore, ui: SharedUiState, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => {
                if let Err(err) = handle_request(request, &store, &ui) {
                    warn!("http response failed: {err:#}");
                }
            }
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

fn handle_request(request: tiny_http::Request, store: &SharedStore, ui: &SharedUiState) -> Result<()> {
    if request.method() != &Method::Get {
        return send_text(request, StatusCode(405), "method not allowed");
    }
    let Some(remote_addr) = request.remote_addr() else {
        return send_text(request, StatusCode(400), "missing remote address");
    };
    if !is_local_network_ip(remote_addr.ip()) {
        return send_text(request, StatusCode(403), "forbidden: local network only");
    }

    let url = request.url().to_string();
    let (path, query) = split_path_query(&url);
    match path {
        "/" => {
            let page = {
                let guard = store::lock(store);
                render_index(guard.get_all(), &ui.snapshot())
            };
            send_html(request, StatusCode(200), &page)
        }
        "/add" => match apply_add_query(store, query) {
            Ok(_) => send_html(request, StatusCode(200), REDIRECT_HOME),
            Err(reason) => send_text(request, StatusCode(400), &reason),
        },
        "/delete" => match apply_delete_query(store, query) {
            Ok(_) => send_html(request, StatusCode(200), REDIRECT_HOME),
            Err(reason) => send_text(request, StatusCode(400), &reason),
        },
        "/api/alarms" => {
            let records = store::lock(store)
                .get_all()
                .iter()
                .map(Alarm::to_record)
                .collect::<Vec<AlarmRecord>>();
            send_json(request, StatusCode(200), &records)
        }
        "/api/status" => send_json(request, StatusCode(200), &ui.snapshot()),
        _ => send_text(request, StatusCode(404), "not found"),
    }
}

const REDIRECT_HOME: &str = "<meta http-equiv='refresh' content='0; url=/'/>";

/// `hour=&minute=&Mon=on...`; returns the new alarm's position.
fn apply_add_query(store: &SharedStore, query: &str) -> Result<usize, String> {
    let hour = int_param(query, "hour")?;
    let minute = int_param(query, "minute")?;
    let weekdays = WEEKDAYS
        .into_iter()
        .filter(|day| query_param(query, weekday_to_token(*day)) == Some("on"))
        .collect();
    store::lock(store)
        .add(hour, minute, weekdays)
        .map_err(|err| err.to_string())
}

/// `id=<position>`; returns whether an alarm was removed.
fn apply_delete_query(store: &SharedStore, query: &str) -> Result<bool, String> {
    let index = int_param(query, "id")?;
    let removed = usize::try_from(index)
        .ok()
        .and_then(|index| store::lock(store).delete(index));
    Ok(removed.is_some())
}

fn int_param(query: &str, key: &str) -> Result<i64, String> {
    let raw = query_param(query, key).ok_or_else(|| format!("missing '{key}'"))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("'{key}' must be an integer, got '{raw}'"))
}

fn render_index(alarms: &[Alarm], ui: &UiSnapshot) -> String {
    let mut list = String::new();
    for (index, alarm) in alarms.iter().enumerate() {
        let state = if alarm.enabled { "" } else { " (off)" };
        let _ = write!(
            list,
            "<li>{:02}:{:02} ({}){state} <a class=\"delete\" href=\"/delete?id={index}\">delete</a></li>",
            alarm.hour,
            alarm.minute,
            format_weekdays(&alarm.weekdays)
        );
    }
    if alarms.is_empty() {
        list.push_str("<li>No alarms</li>");
    }

    let hours = (0..24)
        .map(|h| format!("<option value=\"{h}\">{h:02}</option>"))
        .collect::<String>();
    let minutes = (0..60)
        .map(|m| format!("<option value=\"{m}\">{m:02}</option>"))
        .collect::<String>();
    let days = WEEKDAYS
        .into_iter()
        .map(|day| {
            let tag = weekday_to_token(day);
            format!("<label><input type=\"checkbox\" name=\"{tag}\">{tag}</label>")
        })
        .collect::<String>();
    let last_ring = ui
        .last_ring
        .as_ref()
        .map(|ring| format!("<p>Last ring: {} at {} ({})</p>", ring.alarm, ring.at, ring.reason))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Alarm clock</title></head>\n<body>\n<h2>Alarm clock</h2>\n<form action=\"/add\">\n<select name=\"hour\">{hours}</select> : <select name=\"minute\">{minutes}</select>\n<div>{days}</div>\n<button type=\"submit\">Add alarm</button>\n</form>\n<ul>{list}</ul>\n{last_ring}\n</body></html>\n"
    )
}

fn send_json<T: Serialize>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    respond(request, status, payload, "application/json; charset=utf-8")
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    respond(request, status, body.as_bytes().to_vec(), "text/plain; charset=utf-8")
}

fn send_html(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    respond(request, status, body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn respond(
    request: tiny_http::Request,
    status: StatusCode,
    body: Vec<u8>,
    content_type: &str,
) -> Result<()> {
    let header = Header::from_str(&format!("Content-Type: {content_type}"))
        .map_err(|_| anyhow::anyhow!("failed to build content-type header"))?;
    request.respond(
        Response::from_data(body)
            .with_status_code(status)
            .with_header(header),
    )?;
    Ok(())
}

fn split_path_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        if k == key {
            return Some(v);
        }
    }
    None
}

fn is_local_network_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || is_ipv4_mapped_local(v6)
        }
    }
}

fn is_ipv4_mapped_local(v6: Ipv6Addr) -> bool {
    match v6.to_ipv4_mapped() {
        Some(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
        None => false,
    }
}
