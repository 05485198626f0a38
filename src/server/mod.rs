use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::Html,
    routing::get,
};
use color_eyre::eyre::{self, WrapErr};
use console::style;
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use crate::{
    config::AppConfig,
    credentials::CredentialExchange,
    error::AppError,
    flow::{Submitter, Workspace},
    form::FormValues,
    invoke::Invoker,
    page::{PageView, render_page},
    session::{RequestSession, cookie_value},
};

pub const WORKSPACE_COOKIE: &str = "form_session";

struct WorkspaceEntry {
    workspace: Workspace,
    touched: Instant,
}

pub struct AppState<E, I> {
    pub config: AppConfig,
    pub submitter: Submitter<E, I>,
    workspaces: Mutex<HashMap<Uuid, WorkspaceEntry>>,
}

impl<E, I> AppState<E, I> {
    pub fn new(config: AppConfig, submitter: Submitter<E, I>) -> Arc<Self> {
        Arc::new(Self {
            config,
            submitter,
            workspaces: Mutex::new(HashMap::new()),
        })
    }

    /// Number of workspaces currently held.
    pub fn workspace_count(&self) -> usize {
        self.lock().map(|workspaces| workspaces.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, WorkspaceEntry>>, AppError> {
        self.workspaces.lock().map_err(|_| AppError::StatePoisoned)
    }

    /// Reads a workspace without creating it. Unknown ids see an empty one.
    fn view_workspace<T>(&self, id: Uuid, f: impl FnOnce(&Workspace) -> T) -> Result<T, AppError> {
        let workspaces = self.lock()?;
        Ok(match workspaces.get(&id) {
            Some(entry) => f(&entry.workspace),
            None => f(&Workspace::default()),
        })
    }

    /// Mutates a workspace, creating it if needed. Idle workspaces of other
    /// browsers are dropped on the way.
    fn with_workspace<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Workspace) -> T,
    ) -> Result<T, AppError> {
        let mut workspaces = self.lock()?;
        let now = Instant::now();
        let idle = self.config.server.workspace_idle();

        let before = workspaces.len();
        workspaces.retain(|key, entry| {
            *key == id || entry.workspace.busy() || now.duration_since(entry.touched) < idle
        });
        if workspaces.len() < before {
            debug!("Dropped {} idle workspace(s)", before - workspaces.len());
        }

        let entry = workspaces.entry(id).or_insert_with(|| WorkspaceEntry {
            workspace: Workspace::default(),
            touched: now,
        });
        entry.touched = now;

        Ok(f(&mut entry.workspace))
    }
}

/// Finds the browser's workspace id, issuing a new one if needed.
fn workspace_id(headers: &HeaderMap) -> (Uuid, HeaderMap) {
    let existing = cookie_value(headers, WORKSPACE_COOKIE).and_then(|v| Uuid::parse_str(&v).ok());

    let mut response_headers = HeaderMap::new();
    let id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            let cookie = format!("{WORKSPACE_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response_headers.insert(SET_COOKIE, value);
            }
            id
        }
    };

    (id, response_headers)
}

async fn show_form<E, I>(
    State(state): State<Arc<AppState<E, I>>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Html<String>), AppError> {
    let (id, response_headers) = workspace_id(&headers);
    let page = state.view_workspace(id, |ws| render_page(&PageView::from(ws)))??;

    Ok((response_headers, Html(page)))
}

async fn submit_form<E, I>(
    State(state): State<Arc<AppState<E, I>>>,
    headers: HeaderMap,
    form: Result<Form<FormValues>, FormRejection>,
) -> Result<(HeaderMap, Html<String>), AppError>
where
    E: CredentialExchange + Send + Sync + 'static,
    I: Invoker + Send + Sync + 'static,
{
    let Form(values) = form.map_err(|e| {
        warn!("Rejected form body: {e}");
        AppError::MalformedForm(e.body_text())
    })?;

    let (id, response_headers) = workspace_id(&headers);
    let session = RequestSession::from_headers(&headers, &state.config.session.cookie);

    let ticket = state.with_workspace(id, |ws| ws.begin(values.clone()))?;

    // Settling happens in its own task so the workspace is released even
    // when the client goes away mid-submission.
    let task_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        let outcome = task_state.submitter.submit(&session, &values).await;

        let policy = task_state.config.flow;
        let page = task_state.with_workspace(id, |ws| {
            ws.settle(ticket, outcome, &policy);
            render_page(&PageView::from(&*ws))
        })??;

        Ok::<_, AppError>(page)
    });

    let page = task.await.map_err(|e| {
        error!("Submission task failed: {e}");
        AppError::TaskFailed
    })??;

    Ok((response_headers, Html(page)))
}

async fn health() -> &'static str {
    "ok"
}

pub fn router<E, I>(state: Arc<AppState<E, I>>) -> Router
where
    E: CredentialExchange + Send + Sync + 'static,
    I: Invoker + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(show_form::<E, I>).post(submit_form::<E, I>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run<E, I>(state: Arc<AppState<E, I>>) -> eyre::Result<()>
where
    E: CredentialExchange + Send + Sync + 'static,
    I: Invoker + Send + Sync + 'static,
{
    let address = state.config.server.bind.clone();
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind {address}"))?;

    println!(
        "Starting server at {}",
        style(format!("http://{address}")).bold().bright().blue()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Failed to start server")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
