//! The HTTP server around the router.
//!
//! One [`Router`] per request method, a thin accept loop on top: every
//! accepted connection gets its own task, requests on a connection are
//! served in arrival order, and an idle connection is closed after 30
//! seconds. Routes are registered before the server starts accepting, so
//! the registry is shared read-only afterwards and lookups take no locks.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tracing::{debug, error, info};

use crate::error::InsertError;
use crate::matches::Matches;
use crate::router::Router;

pub type Request = hyper::Request<Incoming>;
pub type Response = hyper::Response<Full<Bytes>>;

/// How long a connection may sit between requests before it is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// A registered route handler.
///
/// A handler receives the request and the pattern captures and produces an
/// optional response; `None` falls through to the server's 404.
pub trait Handler: Send + Sync {
  fn handle(&self, req: Request, matches: Matches) -> BoxFuture<'static, Option<Response>>;
}

impl<F, R> Handler for F
where
  F: Fn(Request, Matches) -> R + Send + Sync,
  R: Future<Output = Option<Response>> + Send + 'static,
{
  fn handle(&self, req: Request, matches: Matches) -> BoxFuture<'static, Option<Response>> {
    Box::pin(self(req, matches))
  }
}

pub type BoxedHandler = Box<dyn Handler>;

/// The HTTP server: a method-keyed registry of routers plus the accept
/// loop that serves them.
#[derive(Default)]
pub struct CoreServer {
  routers: HashMap<Method, Router<BoxedHandler>>,
}

impl CoreServer {
  pub fn new() -> Self {
    CoreServer::default()
  }

  /// Registers a handler for `method` and `pattern`.
  pub fn register<H>(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), InsertError>
  where
    H: Handler + 'static,
  {
    self
      .routers
      .entry(method)
      .or_default()
      .insert(pattern, Box::new(handler))
  }

  pub fn get<H: Handler + 'static>(&mut self, pattern: &str, handler: H) -> Result<(), InsertError> {
    self.register(Method::GET, pattern, handler)
  }

  pub fn put<H: Handler + 'static>(&mut self, pattern: &str, handler: H) -> Result<(), InsertError> {
    self.register(Method::PUT, pattern, handler)
  }

  pub fn post<H: Handler + 'static>(&mut self, pattern: &str, handler: H) -> Result<(), InsertError> {
    self.register(Method::POST, pattern, handler)
  }

  pub fn delete<H: Handler + 'static>(
    &mut self,
    pattern: &str,
    handler: H,
  ) -> Result<(), InsertError> {
    self.register(Method::DELETE, pattern, handler)
  }

  /// Binds `addr` and serves until SIGINT or SIGTERM arrives.
  pub async fn run(self, addr: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    self.serve(listener).await
  }

  /// Serves connections from an already bound listener.
  pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
      info!("listening on http://{}", addr);
    }

    let server = Arc::new(self);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
      tokio::select! {
        _ = &mut shutdown => {
          info!("shutdown signal received, stopping");
          return Ok(());
        }
        accepted = listener.accept() => {
          match accepted {
            Ok((stream, peer)) => {
              let server = server.clone();
              tokio::spawn(async move { server.session(stream, peer).await });
            }
            Err(err) => error!("accept failed: {}", err),
          }
        }
      }
    }
  }

  /// Serves one client connection until the peer goes away or the idle
  /// timer fires.
  async fn session(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
    debug!("session opened by {}", peer);

    let server = self.clone();
    let service = service_fn(move |req| {
      let server = server.clone();
      async move { Ok::<_, Infallible>(server.handle_request(req).await) }
    });

    let conn = http1::Builder::new()
      .timer(TokioTimer::new())
      .keep_alive(true)
      .header_read_timeout(IDLE_TIMEOUT)
      .serve_connection(TokioIo::new(stream), service);

    if let Err(err) = conn.await {
      error!("session with {} failed: {}", peer, err);
    }
    debug!("session with {} closed", peer);
  }

  async fn handle_request(&self, req: Request) -> Response {
    info!("handling request: {} {}", req.method(), req.uri().path());

    let mut matches = Matches::new();
    let handler = self
      .routers
      .get(req.method())
      .and_then(|router| router.find_path(req.uri().path(), &mut matches));

    if let Some(handler) = handler {
      if let Some(mut response) = handler.handle(req, matches).await {
        response
          .headers_mut()
          .insert(header::SERVER, HeaderValue::from_static("Core"));
        return response;
      }
      info!("handler declined the request");
    } else {
      info!("no handler registered for the route");
    }

    not_found()
  }
}

/// The shared 404: an empty JSON object.
fn not_found() -> Response {
  let mut response = hyper::Response::new(Full::from("{}"));
  *response.status_mut() = StatusCode::NOT_FOUND;
  response
    .headers_mut()
    .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
  response
    .headers_mut()
    .insert(header::SERVER, HeaderValue::from_static("Core"));
  response
}

async fn shutdown_signal() {
  let ctrl_c = async {
    signal::ctrl_c()
      .await
      .expect("failed to install SIGINT handler");
  };

  #[cfg(unix)]
  let terminate = async {
    signal::unix::signal(signal::unix::SignalKind::terminate())
      .expect("failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}
