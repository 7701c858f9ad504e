//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. All services are
//! constructed once at startup and shared through `AppState`; request
//! handlers never build their own ledger or cipher instances.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::audit::AccessAuditor;
use crate::auth::JwtValidator;
use crate::cipher::CipherService;
use crate::config::Args;
use crate::ledger::{build_ledger, RewardsLedger};
use crate::machine::{AuthorizationRegistry, MachineIdentity};
use crate::routes;
use crate::types::{Result, VaultError};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub identity: Arc<MachineIdentity>,
    pub registry: Arc<AuthorizationRegistry>,
    pub cipher: Arc<CipherService>,
    pub auditor: Arc<AccessAuditor>,
    /// The process-wide ledger instance, built once at startup
    pub ledger: Arc<dyn RewardsLedger>,
    pub jwt: JwtValidator,
    pub started_at: Instant,
}

impl AppState {
    /// Wire up all services. `Args::validate()` must have passed first.
    pub fn new(args: Args) -> Result<Self> {
        let identity = Arc::new(MachineIdentity::new(args.fingerprint_salt()));
        let grants = args
            .parse_authorized_machines()
            .map_err(VaultError::Configuration)
            .or_else(|e| if args.demo_mode { Ok(None) } else { Err(e) })?;
        let registry = Arc::new(AuthorizationRegistry::new(Arc::clone(&identity), grants));
        let cipher = Arc::new(CipherService::new(
            Arc::clone(&identity),
            Arc::clone(&registry),
            args.master_secret(),
            args.reviewer_master_key(),
        ));
        let auditor = Arc::new(AccessAuditor::new(
            Arc::clone(&identity),
            Arc::clone(&cipher),
        ));
        let backend = args.ledger_backend().map_err(VaultError::Configuration)?;
        let ledger = build_ledger(
            backend,
            Arc::clone(&identity),
            Arc::clone(&registry),
            Arc::clone(&cipher),
            Arc::clone(&auditor),
        );
        let jwt = JwtValidator::new(&args.master_secret(), args.jwt_expiry_seconds);

        Ok(Self {
            args,
            identity,
            registry,
            cipher,
            auditor,
            ledger,
            jwt,
            started_at: Instant::now(),
        })
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Vault listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    let fp = state.identity.fingerprint();
    info!(
        machine_id = %fp.machine_id,
        verified = fp.verified,
        "Machine fingerprint computed"
    );

    if state.args.demo_mode {
        warn!("Demo mode enabled - insecure fallback secrets and demo identities are active");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("{} {} from {}", method, path, addr);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/wallet") => routes::handle_wallet(state, req).await,
        (&Method::POST, "/rewards/mint") => routes::handle_mint(state, req).await,
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(state),
        (&Method::GET, "/version") => routes::version_info(),
        (&Method::OPTIONS, _) => cors_preflight(),
        _ => routes::error_response(StatusCode::NOT_FOUND, "Not found", Some(&path)),
    };

    Ok(response)
}

fn cors_preflight() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Authorization, Content-Type, X-Demo-User-Id, X-User-Secret",
        )
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
