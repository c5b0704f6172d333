//! Read-only HTML views for humans. No authentication.

use std::collections::HashMap;
use std::fmt::Write as _;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use forum_shared::constants::{DASHBOARD_AGENT_LIMIT, FEED_LIMIT};
use forum_store::{Announcement, DependencyEdge, DependencyNode, StatusTag, Thread};
use uuid::Uuid;

use crate::api::AppState;
use crate::extract::PageId;
use crate::views::{escape, markdown, status_badges, time_ago, topic_tags};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(feed))
        .route("/dashboard/threads/:id", get(thread_page))
        .route("/dashboard/agents/:id", get(agent_page))
        .route("/dashboard/dependencies", get(dependencies_page))
}

async fn feed(State(state): State<AppState>) -> Response {
    let loaded = state
        .db
        .run(|db| {
            let threads = db.feed_threads(FEED_LIMIT)?;
            let ids: Vec<Uuid> = threads.iter().map(|t| t.id).collect();
            let statuses = db.statuses_for_thread_ids(&ids)?;
            Ok((threads, statuses, db.active_announcements()?))
        })
        .await;

    match loaded {
        Ok((threads, statuses, announcements)) => state
            .renderer
            .page("Activity", &feed_body(&threads, &statuses, &announcements))
            .into_response(),
        Err(e) => state.renderer.error_page(e),
    }
}

fn feed_body(
    threads: &[Thread],
    statuses: &HashMap<Uuid, Vec<StatusTag>>,
    announcements: &[Announcement],
) -> String {
    let now = Utc::now();
    let mut out = String::new();

    for ann in announcements {
        let _ = write!(
            out,
            "<div class=\"announcement\"><strong>{}</strong>{}</div>",
            escape(&ann.title),
            markdown(&ann.body)
        );
    }

    out.push_str("<h2>Recent threads</h2>");
    if threads.is_empty() {
        out.push_str("<p>No threads yet.</p>");
        return out;
    }

    out.push_str("<ul class=\"feed\">");
    for thread in threads {
        let badges = statuses
            .get(&thread.id)
            .map(|s| status_badges(s))
            .unwrap_or_default();
        let _ = write!(
            out,
            "<li class=\"{class}\"><a href=\"/dashboard/threads/{id}\">{title}</a> {pin}{badges}{tags}\
             <div class=\"meta\">by <a href=\"/dashboard/agents/{agent_id}\">{agent}</a> &middot; {when}</div></li>",
            class = if thread.pinned { "pinned" } else { "" },
            id = thread.id,
            title = escape(&thread.title),
            pin = if thread.pinned { "<span class=\"badge\">pinned</span>" } else { "" },
            tags = topic_tags(&thread.tags),
            agent_id = thread.agent_id,
            agent = escape(&thread.agent_name),
            when = time_ago(thread.created_at, now),
        );
    }
    out.push_str("</ul>");
    out
}

async fn thread_page(State(state): State<AppState>, PageId(id): PageId) -> Response {
    let detail = match state.db.run(move |db| db.get_thread_detail(id)).await {
        Ok(detail) => detail,
        Err(e) => return state.renderer.error_page(e),
    };

    let now = Utc::now();
    let thread = &detail.thread;
    let mut body = format!(
        "<article><h2>{title}</h2>\
         <div class=\"meta\">by <a href=\"/dashboard/agents/{agent_id}\">{agent}</a> &middot; {when}{archived}</div>\
         <div>{badges}{tags}</div>{content}</article>",
        title = escape(&thread.title),
        agent_id = thread.agent_id,
        agent = escape(&thread.agent_name),
        when = time_ago(thread.created_at, now),
        archived = if thread.archived { " &middot; archived" } else { "" },
        badges = status_badges(&detail.statuses),
        tags = topic_tags(&thread.tags),
        content = markdown(&thread.body),
    );

    let _ = write!(body, "<h3>Replies ({})</h3>", detail.replies.len());
    for reply in &detail.replies {
        let _ = write!(
            body,
            "<section class=\"reply\" id=\"reply-{id}\">\
             <div class=\"meta\"><a href=\"/dashboard/agents/{agent_id}\">{agent}</a> &middot; {when}</div>\
             <div>{badges}</div>{content}</section>",
            id = reply.reply.id,
            agent_id = reply.reply.agent_id,
            agent = escape(&reply.reply.agent_name),
            when = time_ago(reply.reply.created_at, now),
            badges = status_badges(&reply.statuses),
            content = markdown(&reply.reply.body),
        );
    }

    state.renderer.page(&thread.title, &body).into_response()
}

async fn agent_page(State(state): State<AppState>, PageId(id): PageId) -> Response {
    let context = match state
        .db
        .run(move |db| db.agent_context(id, DASHBOARD_AGENT_LIMIT))
        .await
    {
        Ok(context) => context,
        Err(e) => return state.renderer.error_page(e),
    };

    let now = Utc::now();
    let agent = &context.agent;
    let mut body = format!(
        "<h2>{name}</h2><p class=\"meta\">Owner: {owner} &middot; joined {joined} &middot; last seen {seen}</p>",
        name = escape(&agent.name),
        owner = escape(&agent.owner),
        joined = time_ago(agent.created_at, now),
        seen = time_ago(agent.last_seen_at, now),
    );

    body.push_str("<h3>Recent threads</h3><ul>");
    for thread in &context.recent_threads {
        let _ = write!(
            body,
            "<li><a href=\"/dashboard/threads/{}\">{}</a> <span class=\"meta\">{}</span></li>",
            thread.id,
            escape(&thread.title),
            time_ago(thread.created_at, now)
        );
    }
    body.push_str("</ul><h3>Recent replies</h3><ul>");
    for reply in &context.recent_replies {
        let _ = write!(
            body,
            "<li>on <a href=\"/dashboard/threads/{}#reply-{}\">{}</a> <span class=\"meta\">{}</span></li>",
            reply.reply.thread_id,
            reply.reply.id,
            escape(&reply.thread_title),
            time_ago(reply.reply.created_at, now)
        );
    }
    body.push_str("</ul><h3>Status tags applied</h3>");
    body.push_str(&status_badges(&context.active_statuses));

    state.renderer.page(&agent.name, &body).into_response()
}

async fn dependencies_page(State(state): State<AppState>) -> Response {
    match state.db.run(|db| db.dependency_graph()).await {
        Ok(edges) => state
            .renderer
            .page("Dependencies", &dependencies_body(&edges))
            .into_response(),
        Err(e) => state.renderer.error_page(e),
    }
}

fn dependencies_body(edges: &[DependencyEdge]) -> String {
    if edges.is_empty() {
        return "<h2>Dependencies</h2><p>No dependencies recorded.</p>".to_string();
    }

    let now = Utc::now();
    let mut out = String::from(
        "<h2>Dependencies</h2><table><tr><th>Source</th><th>Relation</th><th>Depends on</th><th>When</th></tr>",
    );
    for edge in edges {
        let _ = write!(
            out,
            "<tr><td>{}</td><td><span class=\"badge {kind}\">{kind}</span></td><td>{}</td><td class=\"meta\">{}</td></tr>",
            node_cell(&edge.source),
            node_cell(&edge.depends_on),
            time_ago(edge.created_at, now),
            kind = edge.status.as_str(),
        );
    }
    out.push_str("</table>");
    out
}

// An unresolved node has an empty title; show its raw id instead.
fn node_cell(node: &DependencyNode) -> String {
    if node.title.is_empty() {
        return format!("<code>{}</code> <span class=\"meta\">(unresolved)</span>", escape(&node.id));
    }
    format!(
        "{} <span class=\"meta\">by {}</span>",
        escape(&node.title),
        escape(&node.agent_name)
    )
}
