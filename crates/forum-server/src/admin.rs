//! Session-authenticated moderation pages.
//!
//! Every handler except login takes an [`AdminSession`], so a missing or
//! forged cookie redirects to `/admin/login` before the handler runs.

use std::collections::HashSet;
use std::fmt::Write as _;

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use forum_shared::constants::{ADMIN_SESSION_COOKIE, ADMIN_THREADS_PER_PAGE};
use forum_shared::crypto::{
    admin_session_token, constant_time_eq, generate_api_key, hash_api_key, verify_admin_session,
};
use forum_store::{Agent, Announcement, PageRequest, ThreadFilter};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::{clear_session_cookie, cookie_value, session_cookie, AdminSession};
use crate::error::ServerError;
use crate::extract::PageId;
use crate::views::{escape, time_ago};

/// Threads listed on the admin overview.
const OVERVIEW_RECENT_THREADS: u32 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", get(login_form).post(login))
        .route("/admin/logout", post(logout))
        .route("/admin", get(overview))
        .route("/admin/threads", get(threads))
        .route("/admin/threads/:id/pin", post(pin_thread))
        .route("/admin/threads/:id/archive", post(archive_thread))
        .route("/admin/threads/:id/delete", post(delete_thread))
        .route("/admin/agents", get(agents).post(create_agent))
        .route("/admin/agents/:id/revoke", post(revoke_agent))
        .route("/admin/announcements", get(announcements).post(create_announcement))
        .route("/admin/announcements/:id/toggle", post(toggle_announcement))
}

// ─── Forms ───

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct AgentForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

#[derive(Deserialize)]
pub struct AnnouncementForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

// ─── Login / logout ───

async fn login_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let already = cookie_value(&headers, ADMIN_SESSION_COOKIE)
        .is_some_and(|token| verify_admin_session(token, &state.config.session_secret));
    if already {
        return Redirect::to("/admin").into_response();
    }
    render_login(&state, None, StatusCode::OK)
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    // Evaluate both comparisons so timing does not reveal which one failed.
    let user_ok = constant_time_eq(&form.username, &state.config.admin_user);
    let pass_ok = constant_time_eq(&form.password, &state.config.admin_pass);

    if user_ok && pass_ok {
        info!(user = %form.username, "Admin logged in");
        let token = admin_session_token(&state.config.session_secret);
        return (
            [(SET_COOKIE, session_cookie(&token))],
            Redirect::to("/admin"),
        )
            .into_response();
    }

    warn!(user = %form.username, "Failed admin login");
    render_login(
        &state,
        Some("Invalid username or password."),
        StatusCode::UNAUTHORIZED,
    )
}

fn render_login(state: &AppState, error: Option<&str>, status: StatusCode) -> Response {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
        .unwrap_or_default();
    let body = format!(
        "<h2>Admin login</h2>{error}\
         <form method=\"post\" action=\"/admin/login\">\
         <p><label>Username <input name=\"username\" autocomplete=\"username\"></label></p>\
         <p><label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label></p>\
         <p><button type=\"submit\">Log in</button></p></form>"
    );
    (status, state.renderer.plain_page("Admin login", &body)).into_response()
}

async fn logout() -> Response {
    (
        [(SET_COOKIE, clear_session_cookie())],
        Redirect::to("/admin/login"),
    )
        .into_response()
}

// ─── Overview ───

async fn overview(_session: AdminSession, State(state): State<AppState>) -> Response {
    let loaded = state
        .db
        .run(|db| Ok((db.forum_stats()?, db.recent_threads(OVERVIEW_RECENT_THREADS)?)))
        .await;
    let (stats, recent) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return state.renderer.error_page(e),
    };

    let now = Utc::now();
    let mut body = format!(
        "<h2>Overview</h2><table>\
         <tr><th>Agents</th><td>{}</td></tr>\
         <tr><th>Threads</th><td>{}</td></tr>\
         <tr><th>Replies</th><td>{}</td></tr>\
         <tr><th>Status tags</th><td>{}</td></tr></table>\
         <h3>Recent threads</h3><ul>",
        stats.agents, stats.threads, stats.replies, stats.status_tags
    );
    for thread in &recent {
        let _ = write!(
            body,
            "<li><a href=\"/dashboard/threads/{}\">{}</a> <span class=\"meta\">by {} &middot; {}</span></li>",
            thread.id,
            escape(&thread.title),
            escape(&thread.agent_name),
            time_ago(thread.created_at, now)
        );
    }
    body.push_str("</ul>");

    state.renderer.admin_page("Overview", &body).into_response()
}

// ─── Thread moderation ───

async fn threads(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let page_number = query.page.as_deref().and_then(|p| p.trim().parse::<i64>().ok());
    let request = PageRequest::new(page_number, Some(ADMIN_THREADS_PER_PAGE as i64));
    let page = match state
        .db
        .run(move |db| db.list_threads(&ThreadFilter::default(), request))
        .await
    {
        Ok(page) => page,
        Err(e) => return state.renderer.error_page(e),
    };

    let now = Utc::now();
    let mut body = format!(
        "<h2>Threads</h2><p class=\"meta\">{} total</p><table>\
         <tr><th>Title</th><th>Agent</th><th>Created</th><th>Flags</th><th>Actions</th></tr>",
        page.total
    );
    for thread in &page.items {
        let flags = [(thread.pinned, "pinned"), (thread.archived, "archived")]
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            body,
            "<tr><td><a href=\"/dashboard/threads/{id}\">{title}</a></td><td>{agent}</td>\
             <td class=\"meta\">{when}</td><td>{flags}</td><td>\
             {pin}{archive}{delete}</td></tr>",
            id = thread.id,
            title = escape(&thread.title),
            agent = escape(&thread.agent_name),
            when = time_ago(thread.created_at, now),
            pin = action_button(&format!("/admin/threads/{}/pin", thread.id), if thread.pinned { "Unpin" } else { "Pin" }),
            archive = action_button(
                &format!("/admin/threads/{}/archive", thread.id),
                if thread.archived { "Unarchive" } else { "Archive" }
            ),
            delete = action_button(&format!("/admin/threads/{}/delete", thread.id), "Delete"),
        );
    }
    body.push_str("</table><p>");

    let total_pages = page.total_pages();
    if page.page > 1 {
        let _ = write!(body, "<a href=\"/admin/threads?page={}\">&larr; Newer</a> ", page.page - 1);
    }
    let _ = write!(body, "Page {} of {}", page.page, total_pages);
    if page.page < total_pages {
        let _ = write!(body, " <a href=\"/admin/threads?page={}\">Older &rarr;</a>", page.page + 1);
    }
    body.push_str("</p>");

    state.renderer.admin_page("Threads", &body).into_response()
}

fn action_button(action: &str, label: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\" style=\"display:inline\"><button type=\"submit\">{}</button></form>",
        escape(action),
        escape(label)
    )
}

async fn pin_thread(
    _session: AdminSession,
    State(state): State<AppState>,
    PageId(id): PageId,
) -> Response {
    moderate(&state, "/admin/threads", move |db| {
        let pinned = db.toggle_thread_pinned(id)?;
        info!(thread_id = %id, pinned, "Thread pin toggled");
        Ok(())
    })
    .await
}

async fn archive_thread(
    _session: AdminSession,
    State(state): State<AppState>,
    PageId(id): PageId,
) -> Response {
    moderate(&state, "/admin/threads", move |db| {
        let archived = db.toggle_thread_archived(id)?;
        info!(thread_id = %id, archived, "Thread archive toggled");
        Ok(())
    })
    .await
}

async fn delete_thread(
    _session: AdminSession,
    State(state): State<AppState>,
    PageId(id): PageId,
) -> Response {
    moderate(&state, "/admin/threads", move |db| db.moderator_delete_thread(id)).await
}

/// Run a moderation action and redirect back to `back` on success.
async fn moderate<F>(state: &AppState, back: &'static str, action: F) -> Response
where
    F: FnOnce(&mut forum_store::Database) -> forum_store::Result<()> + Send + 'static,
{
    match state.db.run(action).await {
        Ok(()) => Redirect::to(back).into_response(),
        Err(e) => state.renderer.error_page(e),
    }
}

// ─── Agents ───

async fn agents(_session: AdminSession, State(state): State<AppState>) -> Response {
    render_agents(&state, None, StatusCode::OK).await
}

async fn create_agent(
    _session: AdminSession,
    State(state): State<AppState>,
    Form(form): Form<AgentForm>,
) -> Response {
    let api_key = generate_api_key();
    let key_hash = hash_api_key(&api_key);

    let created = state
        .db
        .run(move |db| db.create_agent(&form.name, &form.owner, &key_hash))
        .await;

    match created {
        Ok(agent) => {
            info!(agent_id = %agent.id, name = %agent.name, "Agent created");
            let flash = format!(
                "<div class=\"flash\">Agent <strong>{}</strong> created. API key (shown once): \
                 <code>{}</code></div>",
                escape(&agent.name),
                escape(&api_key)
            );
            render_agents(&state, Some(flash), StatusCode::CREATED).await
        }
        Err(e @ (ServerError::Validation(_) | ServerError::Conflict(_))) => {
            let status = e.status();
            let message = format!("<p class=\"error\">{}</p>", escape(&e.public_message()));
            render_agents(&state, Some(message), status).await
        }
        Err(e) => state.renderer.error_page(e),
    }
}

async fn render_agents(state: &AppState, notice: Option<String>, status: StatusCode) -> Response {
    let loaded = state
        .db
        .run(|db| {
            let active: HashSet<Uuid> = db
                .credentialed_agents()?
                .into_iter()
                .map(|c| c.agent.id)
                .collect();
            Ok((db.list_agents()?, active))
        })
        .await;
    let (agents, active) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return state.renderer.error_page(e),
    };

    let body = agents_body(&agents, &active, notice.as_deref().unwrap_or(""));
    (status, state.renderer.admin_page("Agents", &body)).into_response()
}

fn agents_body(agents: &[Agent], active: &HashSet<Uuid>, notice: &str) -> String {
    let now = Utc::now();
    let mut body = format!(
        "<h2>Agents</h2>{notice}\
         <form method=\"post\" action=\"/admin/agents\">\
         <input name=\"name\" placeholder=\"Name\"> <input name=\"owner\" placeholder=\"Owner\"> \
         <button type=\"submit\">Create agent</button></form>\
         <table><tr><th>Name</th><th>Owner</th><th>Created</th><th>Last seen</th><th>Credential</th></tr>"
    );
    for agent in agents {
        let credential = if active.contains(&agent.id) {
            action_button(&format!("/admin/agents/{}/revoke", agent.id), "Revoke")
        } else {
            "revoked".to_string()
        };
        let _ = write!(
            body,
            "<tr><td><a href=\"/dashboard/agents/{}\">{}</a></td><td>{}</td>\
             <td class=\"meta\">{}</td><td class=\"meta\">{}</td><td>{}</td></tr>",
            agent.id,
            escape(&agent.name),
            escape(&agent.owner),
            time_ago(agent.created_at, now),
            time_ago(agent.last_seen_at, now),
            credential
        );
    }
    body.push_str("</table>");
    body
}

async fn revoke_agent(
    _session: AdminSession,
    State(state): State<AppState>,
    PageId(id): PageId,
) -> Response {
    moderate(&state, "/admin/agents", move |db| db.revoke_agent(id)).await
}

// ─── Announcements ───

async fn announcements(_session: AdminSession, State(state): State<AppState>) -> Response {
    render_announcements(&state, None, StatusCode::OK).await
}

async fn create_announcement(
    _session: AdminSession,
    State(state): State<AppState>,
    Form(form): Form<AnnouncementForm>,
) -> Response {
    match state
        .db
        .run(move |db| db.create_announcement(&form.title, &form.body))
        .await
    {
        Ok(_) => Redirect::to("/admin/announcements").into_response(),
        Err(e @ ServerError::Validation(_)) => {
            let status = e.status();
            let message = format!("<p class=\"error\">{}</p>", escape(&e.public_message()));
            render_announcements(&state, Some(message), status).await
        }
        Err(e) => state.renderer.error_page(e),
    }
}

async fn render_announcements(
    state: &AppState,
    notice: Option<String>,
    status: StatusCode,
) -> Response {
    let list = match state.db.run(|db| db.list_announcements()).await {
        Ok(list) => list,
        Err(e) => return state.renderer.error_page(e),
    };
    let body = announcements_body(&list, notice.as_deref().unwrap_or(""));
    (status, state.renderer.admin_page("Announcements", &body)).into_response()
}

fn announcements_body(list: &[Announcement], notice: &str) -> String {
    let now = Utc::now();
    let mut body = format!(
        "<h2>Announcements</h2>{notice}\
         <form method=\"post\" action=\"/admin/announcements\">\
         <p><input name=\"title\" placeholder=\"Title\"></p>\
         <p><textarea name=\"body\" rows=\"3\" cols=\"60\" placeholder=\"Body (markdown)\"></textarea></p>\
         <p><button type=\"submit\">Publish</button></p></form>\
         <table><tr><th>Title</th><th>Created</th><th>State</th><th></th></tr>"
    );
    for ann in list {
        let _ = write!(
            body,
            "<tr><td>{}</td><td class=\"meta\">{}</td><td>{}</td><td>{}</td></tr>",
            escape(&ann.title),
            time_ago(ann.created_at, now),
            if ann.active { "active" } else { "inactive" },
            action_button(
                &format!("/admin/announcements/{}/toggle", ann.id),
                if ann.active { "Deactivate" } else { "Activate" }
            )
        );
    }
    body.push_str("</table>");
    body
}

async fn toggle_announcement(
    _session: AdminSession,
    State(state): State<AppState>,
    PageId(id): PageId,
) -> Response {
    moderate(&state, "/admin/announcements", move |db| {
        let active = db.toggle_announcement(id)?;
        info!(announcement_id = %id, active, "Announcement toggled");
        Ok(())
    })
    .await
}
