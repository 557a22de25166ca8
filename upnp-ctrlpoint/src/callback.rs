//! The inbound event callback endpoint.
//!
//! A small warp server accepting `NOTIFY` on any path and forwarding it to
//! the engine; every other method gets a fixed 412. The port is probed from
//! a configured range so several control points can coexist on one host.

use std::net::{Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::Filter;

use crate::error::{CtrlPointError, Result};

/// Receives forwarded NOTIFY requests and answers with a status code.
pub trait NotifyHandler: Send + Sync + 'static {
    fn handle_notify(&self, path: &str, headers: &[(String, String)], body: &str) -> u16;
}

/// The running callback server.
pub struct EventCallbackServer {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EventCallbackServer {
    /// Bind the first free port in `ports` and start serving.
    pub async fn start(
        ports: RangeInclusive<u16>,
        handler: Arc<dyn NotifyHandler>,
    ) -> Result<Self> {
        let route = notify_route(handler);
        for port in ports.clone() {
            let (tx, rx) = oneshot::channel::<()>();
            let bound = warp::serve(route.clone()).try_bind_with_graceful_shutdown(
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
                async move {
                    rx.await.ok();
                },
            );
            match bound {
                Ok((addr, server)) => {
                    info!(port = addr.port(), "event callback server listening");
                    return Ok(Self {
                        port: addr.port(),
                        shutdown: Some(tx),
                        handle: Some(tokio::spawn(server)),
                    });
                }
                Err(e) => debug!(port, error = %e, "callback port unavailable"),
            }
        }
        Err(CtrlPointError::NoCallbackPort(*ports.start(), *ports.end()))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shut the server down and wait for it to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn notify_route(
    handler: Arc<dyn NotifyHandler>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::any()
        .and(warp::method())
        .and(warp::path::full())
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .map(
            move |method: Method, path: FullPath, headers: HeaderMap, body: Bytes| {
                let status = if method.as_str() == "NOTIFY" {
                    let headers: Vec<(String, String)> = headers
                        .iter()
                        .map(|(name, value)| {
                            (
                                name.as_str().to_string(),
                                String::from_utf8_lossy(value.as_bytes()).into_owned(),
                            )
                        })
                        .collect();
                    let body = String::from_utf8_lossy(&body);
                    handler.handle_notify(path.as_str(), &headers, &body)
                } else {
                    StatusCode::PRECONDITION_FAILED.as_u16()
                };
                warp::reply::with_status(
                    warp::reply(),
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                )
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<String>>,
        status: u16,
    }

    impl NotifyHandler for Recording {
        fn handle_notify(&self, path: &str, _headers: &[(String, String)], _body: &str) -> u16 {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(path.to_string());
            }
            self.status
        }
    }

    #[tokio::test]
    async fn test_notify_is_forwarded() {
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            status: 200,
        });
        let route = notify_route(handler.clone());

        let reply = warp::test::request()
            .method("NOTIFY")
            .path("/abc/urn:upnp-org:serviceId:SwitchPower")
            .header("SID", "uuid:sub1")
            .body("<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\"/>")
            .reply(&route)
            .await;

        assert_eq!(reply.status(), 200);
        assert_eq!(
            handler.seen.lock().unwrap().as_slice(),
            ["/abc/urn:upnp-org:serviceId:SwitchPower"]
        );
    }

    #[tokio::test]
    async fn test_non_notify_is_rejected() {
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            status: 200,
        });
        let route = notify_route(handler.clone());

        let reply = warp::test::request()
            .method("GET")
            .path("/abc/svc")
            .reply(&route)
            .await;

        assert_eq!(reply.status(), 412);
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handler_status_propagates() {
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            status: 412,
        });
        let route = notify_route(handler);

        let reply = warp::test::request()
            .method("NOTIFY")
            .path("/unknown/svc")
            .reply(&route)
            .await;
        assert_eq!(reply.status(), 412);
    }
}
